use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use asklet_bench::utils::{setup_logging, LogConfig};
use asklet_bench::{AskCapability, BenchConfig, BoxError, MetricsCollector, TokenObserver};
use tracing::info;

/// Stand-in model that streams a canned answer one word at a time
struct ScriptedModel {
    answer: &'static str,
    first_token_delay: Duration,
    inter_token_delay: Duration,
}

#[async_trait::async_trait]
impl AskCapability for ScriptedModel {
    async fn ask(&self, _prompt: &str, tokens: &dyn TokenObserver) -> Result<String, BoxError> {
        tokio::time::sleep(self.first_token_delay).await;
        let mut output = String::new();
        for (i, word) in self.answer.split_whitespace().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.inter_token_delay).await;
                output.push(' ');
            }
            output.push_str(word);
            tokens.on_token(word);
        }
        Ok(output)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(LogConfig::default())?;

    let model = ScriptedModel {
        answer: "Rust gives you memory safety without a garbage collector",
        first_token_delay: Duration::from_millis(120),
        inter_token_delay: Duration::from_millis(15),
    };

    let config = BenchConfig {
        version: Some("scripted".to_string()),
        settle_delay: Duration::from_millis(100),
        ..BenchConfig::default()
    };

    let mut collector = MetricsCollector::builder()
        .with_ask(Arc::new(model))
        .with_config(config)
        .build()?;

    let record = collector.run_or_fallback().await;
    info!(total_ms = ?record.total, "Benchmark finished");

    let sample = collector.sample_exchange("Why Rust?").await?;
    println!("{}", sample);
    Ok(())
}
