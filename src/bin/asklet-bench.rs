use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use asklet_bench::utils::{setup_logging, LogConfig};
use asklet_bench::{
    BenchConfig, BenchmarkSample, CommandAsk, MetricsCollector, MetricsRecord, PromptMode,
    SystemHost,
};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "asklet-bench",
    about = "Benchmark a prompt/response command: latency, memory, size and streaming throughput"
)]
struct Args {
    /// JSON configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Version tag stamped on the report
    #[arg(long = "version-tag")]
    version_tag: Option<String>,

    /// Prompt sent during the latency phase
    #[arg(long)]
    prompt: Option<String>,

    /// Settling delay before sampling memory, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Timeout for each ask call, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Send the prompt on stdin instead of as the last argument
    #[arg(long)]
    stdin: bool,

    /// Also run a streamed exchange and report TTFT/TPOT/throughput
    #[arg(long)]
    sample: bool,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Command that answers prompts, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Serialize)]
struct Report {
    record: MetricsRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample: Option<BenchmarkSample>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BenchConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => BenchConfig::default(),
    };
    apply_overrides(&mut config, &args);

    setup_logging(LogConfig::from(config.monitoring.log_level))?;

    let (program, program_args) = args
        .command
        .split_first()
        .ok_or_else(|| anyhow!("a command to benchmark is required"))?;

    // The executable is the script under test
    if args.config.is_none() {
        config.script_pattern = program_name(program);
    }
    config.validate()?;

    let host = SystemHost::new();
    let prompt_mode = if args.stdin {
        PromptMode::Stdin
    } else {
        PromptMode::Argument
    };
    let ask = CommandAsk::new(program)
        .with_args(program_args.iter().cloned())
        .with_prompt_mode(prompt_mode)
        .with_host(host.clone());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling benchmark");
            ctrl_c.cancel();
        }
    });

    let sample_prompt = config.prompt.clone();
    let mut collector = MetricsCollector::builder()
        .with_ask(Arc::new(ask))
        .with_host(Arc::new(host))
        .with_config(config)
        .with_cancellation(cancel)
        .build()?;

    let record = collector.run_or_fallback().await;
    let sample = if args.sample && !record.is_failed() {
        match collector.sample_exchange(&sample_prompt).await {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Sample exchange failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    print_report(&collector, Report { record, sample }, args.json)?;

    if collector.record().is_failed() {
        std::process::exit(1);
    }
    Ok(())
}

fn apply_overrides(config: &mut BenchConfig, args: &Args) {
    if let Some(tag) = &args.version_tag {
        config.version = Some(tag.clone());
    }
    if let Some(prompt) = &args.prompt {
        config.prompt = prompt.clone();
    }
    if let Some(ms) = args.settle_ms {
        config.settle_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = args.timeout_secs {
        config.ask_timeout = Some(Duration::from_secs(secs));
    }
}

fn program_name(program: &str) -> String {
    PathBuf::from(program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

fn print_report(collector: &MetricsCollector, report: Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", collector.formatted_metrics().to_table());
    if let Some(sample) = &report.sample {
        println!();
        println!("{}", sample);
    }
    Ok(())
}
