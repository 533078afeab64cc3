use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::format::FormattedMetrics;
use super::sample::{BenchmarkSample, StreamTracker};
use super::MetricsRecord;
use crate::ask::{AskCapability, IgnoreTokens, TokenObserver};
use crate::config::BenchConfig;
use crate::error::{BenchError, Result, RunFailure};
use crate::host::{Capability, HostEnvironment};

/// Progress of a collector through its measurement phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Created,
    AskMeasured,
    MemoryMeasured,
    ScriptMeasured,
    Completed,
    Failed,
}

/// Runs the benchmark phases against an injected ask capability and host.
///
/// Phases run strictly in order: ask latency, memory, script metrics, total.
/// A failing phase sets the record's `error`, moves the collector to
/// [`RunState::Failed`] and rejects every later phase, so nothing is recorded
/// after an error.
///
/// `run` borrows the collector mutably, so at most one run is in flight per
/// instance.
pub struct MetricsCollector {
    ask: Option<Arc<dyn AskCapability>>,
    host: Arc<dyn HostEnvironment>,
    config: Arc<BenchConfig>,
    cancel: CancellationToken,
    record: MetricsRecord,
    state: RunState,
}

impl MetricsCollector {
    /// Create a collector. The record's `start` is taken from `host` right away.
    pub fn new(
        ask: Option<Arc<dyn AskCapability>>,
        host: Arc<dyn HostEnvironment>,
        config: Arc<BenchConfig>,
    ) -> Self {
        Self::with_cancellation(ask, host, config, CancellationToken::new())
    }

    pub(crate) fn with_cancellation(
        ask: Option<Arc<dyn AskCapability>>,
        host: Arc<dyn HostEnvironment>,
        config: Arc<BenchConfig>,
        cancel: CancellationToken,
    ) -> Self {
        let record = MetricsRecord::new(config.version_tag(), host.now_ms());
        Self {
            ask,
            host,
            config,
            cancel,
            record,
            state: RunState::Created,
        }
    }

    pub fn builder() -> super::CollectorBuilder {
        super::CollectorBuilder::new()
    }

    pub fn record(&self) -> &MetricsRecord {
        &self.record
    }

    pub fn into_record(self) -> MetricsRecord {
        self.record
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Token that aborts an in-flight ask call or settling delay when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every phase in order and return the finished record.
    ///
    /// On failure the returned [`RunFailure`] carries the partially populated
    /// record with `error` set. A collector that already finished a run starts
    /// over with a fresh record.
    #[tracing::instrument(skip(self), fields(version = %self.record.version))]
    pub async fn run(&mut self) -> std::result::Result<MetricsRecord, RunFailure> {
        if self.state != RunState::Created {
            self.reset();
        }

        info!(
            "[Benchmark] Starting Asklet benchmark for version: {}",
            self.record.version
        );

        match self.run_phases().await {
            Ok(()) => {
                if self.config.monitoring.log_results {
                    self.log_results();
                }
                Ok(self.record.clone())
            }
            Err(error) => {
                error!(kind = ?error.kind(), "[Benchmark] Error during benchmark: {}", error);
                Err(RunFailure {
                    error,
                    record: self.record.clone(),
                })
            }
        }
    }

    /// Like [`MetricsCollector::run`], but always yields a record; failures
    /// show up in its `error` field.
    pub async fn run_or_fallback(&mut self) -> MetricsRecord {
        self.run().await.unwrap_or_else(RunFailure::into_record)
    }

    async fn run_phases(&mut self) -> Result<()> {
        self.measure_ask_response().await?;
        self.measure_memory_usage().await?;
        self.measure_script_metrics()?;
        self.calculate_total_time()
    }

    /// Time one round trip of the canonical prompt through the ask capability
    pub async fn measure_ask_response(&mut self) -> Result<()> {
        self.expect_state("ask", RunState::Created)?;

        let t0 = self.host.now_ms();
        let outcome = self
            .invoke_ask(&self.config.prompt, &IgnoreTokens, "ask")
            .await;
        let t1 = self.host.now_ms();

        if let Err(e) = outcome {
            return Err(self.fail(e));
        }

        let duration = t1 - t0;
        self.record.ask_duration = Some(duration);
        self.state = RunState::AskMeasured;
        info!(
            ask_ms = duration,
            "[Benchmark] ask() response time: {:.2}ms",
            duration
        );
        Ok(())
    }

    /// Wait for the settling delay, then sample heap usage if the host exposes it
    pub async fn measure_memory_usage(&mut self) -> Result<()> {
        self.expect_state("memory", RunState::AskMeasured)?;

        if let Err(e) = self.settle().await {
            return Err(self.fail(e));
        }

        match self.host.heap_usage() {
            Capability::Available(usage) => {
                let used = usage.used_mb();
                self.record.heap_used = Some(used);
                self.record.heap_total = Some(usage.total_mb());
                info!(
                    heap_used_mb = used,
                    "[Benchmark] JS Heap used: {:.2} MB",
                    used
                );
            }
            Capability::Unavailable => {
                warn!("[Benchmark] Heap introspection not available on this host.");
            }
        }

        self.state = RunState::MemoryMeasured;
        Ok(())
    }

    /// Look up the benchmarked script among the host's resource-timing entries
    pub fn measure_script_metrics(&mut self) -> Result<()> {
        self.expect_state("script", RunState::MemoryMeasured)?;

        let entries = match self.host.resource_entries() {
            Capability::Available(entries) => entries,
            Capability::Unavailable => {
                warn!("[Benchmark] Resource timing not available on this host.");
                Vec::new()
            }
        };

        let script = entries.iter().find(|entry| {
            entry.name.contains(&self.config.script_pattern)
                && entry.initiator_type == self.config.script_initiator
        });

        match script {
            Some(entry) => {
                let size_kb = entry.transfer_size_kb();
                self.record.script_transfer_size = Some(size_kb);
                self.record.script_duration = Some(entry.duration);
                info!("[Benchmark] Script transfer size: {:.1} KB", size_kb);
                info!("[Benchmark] Script duration: {:.2}ms", entry.duration);
            }
            None => {
                warn!(
                    pattern = %self.config.script_pattern,
                    "[Benchmark] Asklet script resource not found."
                );
            }
        }

        self.state = RunState::ScriptMeasured;
        Ok(())
    }

    pub fn calculate_total_time(&mut self) -> Result<()> {
        self.expect_state("total", RunState::ScriptMeasured)?;
        self.record.total = Some(self.host.now_ms() - self.record.start);
        self.state = RunState::Completed;
        Ok(())
    }

    pub fn formatted_metrics(&self) -> FormattedMetrics {
        FormattedMetrics::from_record(&self.record)
    }

    /// Emit the formatted record as a table
    pub fn log_results(&self) {
        let formatted = self.formatted_metrics();
        info!("[Benchmark] Total benchmark time: {}", formatted.total);
        info!("[Benchmark] Results\n{}", formatted.to_table());
    }

    /// Measure one exchange with `prompt`, deriving TTFT, TPOT and throughput
    /// from the streamed tokens. Does not touch the run record.
    pub async fn sample_exchange(&self, prompt: &str) -> Result<BenchmarkSample> {
        let start = self.host.now_ms();
        let heap_used = self
            .host
            .heap_usage()
            .into_option()
            .map(|usage| usage.used_mb());

        let tracker = StreamTracker::new(self.host.as_ref());
        let response = self.invoke_ask(prompt, &tracker, "sample").await?;
        let end = self.host.now_ms();
        let timing = tracker.finish(&response, end);

        if !timing.streamed {
            debug!("No tokens streamed, approximating token count from the response");
        }

        let mut sample =
            BenchmarkSample::derive(self.config.version_tag(), start, end, timing, response);
        sample.heap_used = heap_used;
        sample.script_transfer_size = self.runtime_transfer_size();

        info!(
            tokens = sample.token_count,
            streamed = sample.streamed,
            ttft_ms = ?sample.ttft,
            tpot_ms = ?sample.tpot,
            throughput = ?sample.throughput,
            "[Benchmark] Sample exchange complete"
        );
        Ok(sample)
    }

    fn runtime_transfer_size(&self) -> Option<f64> {
        let entries = self.host.resource_entries().into_option()?;
        entries
            .iter()
            .find(|entry| {
                self.config
                    .sample_resource_patterns
                    .iter()
                    .any(|pattern| entry.name.contains(pattern.as_str()))
            })
            .map(|entry| entry.transfer_size_kb())
            .filter(|kb| *kb > 0.0)
    }

    async fn invoke_ask(
        &self,
        prompt: &str,
        tokens: &dyn TokenObserver,
        operation: &str,
    ) -> Result<String> {
        let ask = self
            .ask
            .as_ref()
            .ok_or(BenchError::MissingCapability { capability: "ask" })?;

        let bounded = async {
            let call = ask.ask(prompt, tokens);
            let outcome = match self.config.ask_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(BenchError::Timeout {
                            duration: limit,
                            operation: operation.to_string(),
                        })
                    }
                },
                None => call.await,
            };
            outcome.map_err(|source| BenchError::AskFailed {
                message: source.to_string(),
                source,
            })
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BenchError::Cancelled {
                operation: operation.to_string(),
            }),
            result = bounded => result,
        }
    }

    async fn settle(&self) -> Result<()> {
        let delay = self.config.settle_delay;
        debug!(
            delay_ms = delay.as_millis() as u64,
            "Waiting for allocations to settle"
        );
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BenchError::Cancelled {
                operation: "settle".to_string(),
            }),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn expect_state(&self, phase: &'static str, expected: RunState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BenchError::OutOfOrder {
                phase,
                state: self.state,
            })
        }
    }

    fn fail(&mut self, error: BenchError) -> BenchError {
        self.record.error = Some(error.to_string());
        self.state = RunState::Failed;
        error
    }

    fn reset(&mut self) {
        debug!(previous = ?self.state, "Starting a fresh record");
        self.record = MetricsRecord::new(self.config.version_tag(), self.host.now_ms());
        self.state = RunState::Created;
    }
}
