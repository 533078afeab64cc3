use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use asklet_bench::utils::{setup_logging, LogConfig};
use asklet_bench::{BenchConfig, CommandAsk, MetricsCollector, PromptMode, SystemHost};

/// Benchmark a local command as if it were the assistant.
///
/// Usage: cargo run --example command_bench -- <program> [args...]
#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(LogConfig {
        level: tracing::Level::DEBUG,
        ..Default::default()
    })?;

    let mut argv = std::env::args().skip(1);
    let program = argv.next().unwrap_or_else(|| "cat".to_string());
    let args: Vec<String> = argv.collect();

    let host = SystemHost::new();
    let ask = CommandAsk::new(&program)
        .with_args(args)
        .with_prompt_mode(PromptMode::Stdin)
        .with_host(host.clone());

    let config = BenchConfig {
        version: Some(program.clone()),
        script_pattern: program,
        settle_delay: Duration::from_millis(250),
        ask_timeout: Some(Duration::from_secs(30)),
        ..BenchConfig::default()
    };

    let mut collector = MetricsCollector::builder()
        .with_ask(Arc::new(ask))
        .with_host(Arc::new(host))
        .with_config(config)
        .build()?;

    match collector.run().await {
        Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        Err(failure) => {
            eprintln!("Benchmark failed: {}", failure.error);
            println!("{}", serde_json::to_string_pretty(&failure.record)?);
        }
    }
    Ok(())
}
