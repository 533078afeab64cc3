use std::sync::Arc;
use std::time::Duration;

use asklet_bench::{
    AskCapability, BenchConfig, BenchError, BoxError, Capability, ErrorKind, HeapUsage,
    HostEnvironment, MetricsCollector, ResourceTimingEntry, RunState, TokenObserver,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

/// Host with a hand-driven clock and fixed introspection results
#[derive(Default)]
struct FakeHost {
    now: Mutex<f64>,
    heap: Option<HeapUsage>,
    resources: Option<Vec<ResourceTimingEntry>>,
}

impl FakeHost {
    fn starting_at(ms: f64) -> Self {
        Self {
            now: Mutex::new(ms),
            ..Default::default()
        }
    }

    fn advance(&self, ms: f64) {
        *self.now.lock() += ms;
    }
}

impl HostEnvironment for FakeHost {
    fn now_ms(&self) -> f64 {
        *self.now.lock()
    }

    fn heap_usage(&self) -> Capability<HeapUsage> {
        self.heap.into()
    }

    fn resource_entries(&self) -> Capability<Vec<ResourceTimingEntry>> {
        self.resources.clone().into()
    }
}

enum Behavior {
    Respond(&'static str),
    Stream(Vec<(&'static str, f64)>),
    Reject(&'static str),
    Hang,
}

/// Ask capability whose latency is charged to the fake clock
struct FakeAsk {
    host: Arc<FakeHost>,
    latency: f64,
    behavior: Behavior,
    calls: Mutex<Vec<String>>,
}

impl FakeAsk {
    fn new(host: &Arc<FakeHost>, latency: f64, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            host: host.clone(),
            latency,
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl AskCapability for FakeAsk {
    async fn ask(&self, prompt: &str, tokens: &dyn TokenObserver) -> Result<String, BoxError> {
        self.calls.lock().push(prompt.to_string());
        match &self.behavior {
            Behavior::Respond(text) => {
                self.host.advance(self.latency);
                Ok(text.to_string())
            }
            Behavior::Stream(chunks) => {
                let mut output = String::new();
                for (token, delay) in chunks {
                    self.host.advance(*delay);
                    tokens.on_token(token);
                    output.push_str(token);
                }
                self.host.advance(self.latency);
                Ok(output)
            }
            Behavior::Reject(message) => {
                self.host.advance(self.latency);
                Err((*message).into())
            }
            Behavior::Hang => std::future::pending().await,
        }
    }
}

fn config() -> BenchConfig {
    BenchConfig {
        version: Some("react".to_string()),
        settle_delay: Duration::from_millis(5),
        ..BenchConfig::default()
    }
}

#[tokio::test]
async fn full_run_populates_every_field() {
    let host = Arc::new(FakeHost {
        heap: Some(HeapUsage {
            used_bytes: 52_428_800,
            total_bytes: 104_857_600,
        }),
        resources: Some(vec![ResourceTimingEntry::new(
            "https://cdn.example/asklet.min.js",
            "script",
            20_480,
            35.5,
        )]),
        ..FakeHost::starting_at(100.0)
    });
    let ask = FakeAsk::new(&host, 50.0, Behavior::Respond("hello world"));

    let mut collector = MetricsCollector::builder()
        .with_ask(ask.clone())
        .with_host(host.clone())
        .with_config(config())
        .build()
        .unwrap();

    let record = collector.run().await.unwrap();

    assert_eq!(record.version, "react");
    assert_eq!(record.start, 100.0);
    assert_eq!(record.ask_duration, Some(50.0));
    assert_eq!(record.heap_used, Some(50.0));
    assert_eq!(record.heap_total, Some(100.0));
    assert_eq!(record.script_transfer_size, Some(20.0));
    assert_eq!(record.script_duration, Some(35.5));
    assert_eq!(record.total, Some(50.0));
    assert!(record.error.is_none());
    assert_eq!(collector.state(), RunState::Completed);
    assert_eq!(*ask.calls.lock(), vec!["Test prompt".to_string()]);

    let formatted = collector.formatted_metrics();
    assert_eq!(formatted.ask_duration, "50.00ms");
    assert_eq!(formatted.js_heap_used, "50.00 MB");
    assert_eq!(formatted.script_transfer_size, "20.0 KB");
}

#[tokio::test]
async fn missing_heap_introspection_is_not_a_failure() {
    let host = Arc::new(FakeHost::starting_at(0.0));
    let ask = FakeAsk::new(&host, 20.0, Behavior::Respond("ok"));

    let mut collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host.clone())
        .with_config(config())
        .build()
        .unwrap();

    let record = collector.run().await.unwrap();
    assert!(record.heap_used.is_none());
    assert!(record.heap_total.is_none());
    assert!(record.script_transfer_size.is_none());
    assert!(record.script_duration.is_none());
    assert!(record.total.unwrap() >= 0.0);

    let formatted = collector.formatted_metrics();
    assert_eq!(formatted.js_heap_used, "N/A");
    assert_eq!(formatted.script_transfer_size, "N/A");
    assert_eq!(formatted.script_duration, "N/A");
}

#[tokio::test]
async fn rejected_ask_aborts_remaining_phases() {
    let host = Arc::new(FakeHost {
        heap: Some(HeapUsage {
            used_bytes: 1024,
            total_bytes: 2048,
        }),
        ..FakeHost::starting_at(10.0)
    });
    let ask = FakeAsk::new(&host, 5.0, Behavior::Reject("model offline"));

    let mut collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host.clone())
        .with_config(config())
        .build()
        .unwrap();

    let failure = collector.run().await.unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::PhaseFailure);

    let record = failure.record;
    assert_eq!(record.version, "react");
    assert_eq!(record.start, 10.0);
    assert!(record.ask_duration.is_none());
    assert!(record.heap_used.is_none());
    assert!(record.script_transfer_size.is_none());
    assert!(record.total.is_none());
    assert_eq!(
        record.error.as_deref(),
        Some("ask capability failed: model offline")
    );
    assert_eq!(collector.state(), RunState::Failed);
}

#[tokio::test]
async fn unregistered_ask_capability_fails_run() {
    let host = Arc::new(FakeHost::default());
    let mut collector = MetricsCollector::builder()
        .with_host(host)
        .with_config(config())
        .build()
        .unwrap();

    let record = collector.run_or_fallback().await;
    assert_eq!(
        record.error.as_deref(),
        Some("ask capability is not registered")
    );
    assert!(record.total.is_none());
}

#[tokio::test]
async fn hung_ask_times_out() {
    let host = Arc::new(FakeHost::default());
    let ask = FakeAsk::new(&host, 0.0, Behavior::Hang);
    let config = BenchConfig {
        ask_timeout: Some(Duration::from_millis(20)),
        ..config()
    };

    let mut collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host)
        .with_config(config)
        .build()
        .unwrap();

    let failure = collector.run().await.unwrap_err();
    assert!(matches!(failure.error, BenchError::Timeout { .. }));
    assert_eq!(failure.error.kind(), ErrorKind::Timeout);
    assert!(failure.record.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn cancellation_stops_hung_ask() {
    let host = Arc::new(FakeHost::default());
    let ask = FakeAsk::new(&host, 0.0, Behavior::Hang);

    let mut collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host)
        .with_config(config())
        .build()
        .unwrap();

    let token = collector.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let failure = collector.run().await.unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
    assert!(failure.record.ask_duration.is_none());
}

#[tokio::test]
async fn cancellation_during_settle_leaves_later_fields_unset() {
    let host = Arc::new(FakeHost {
        heap: Some(HeapUsage {
            used_bytes: 1024,
            total_bytes: 2048,
        }),
        ..FakeHost::starting_at(0.0)
    });
    let ask = FakeAsk::new(&host, 15.0, Behavior::Respond("ok"));
    let config = BenchConfig {
        settle_delay: Duration::from_secs(30),
        ..config()
    };

    let mut collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host)
        .with_config(config)
        .build()
        .unwrap();

    let token = collector.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let failure = collector.run().await.unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
    assert!(failure.error.to_string().contains("settle"));
    assert_eq!(failure.record.ask_duration, Some(15.0));
    assert!(failure.record.heap_used.is_none());
    assert!(failure.record.heap_total.is_none());
    assert!(failure.record.total.is_none());
    assert!(failure.record.error.is_some());
    assert_eq!(collector.state(), RunState::Failed);
}

#[tokio::test]
async fn rerun_starts_a_fresh_record() {
    let host = Arc::new(FakeHost::starting_at(0.0));
    let ask = FakeAsk::new(&host, 10.0, Behavior::Respond("ok"));

    let mut collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host.clone())
        .with_config(config())
        .build()
        .unwrap();

    let first = collector.run().await.unwrap();
    host.advance(1000.0);
    let second = collector.run().await.unwrap();

    assert_eq!(first.start, 0.0);
    assert_eq!(second.start, 1010.0);
    assert_eq!(second.ask_duration, Some(10.0));
    assert_eq!(second.total, Some(10.0));
}

#[tokio::test]
async fn streamed_sample_derives_token_metrics() {
    let host = Arc::new(FakeHost {
        resources: Some(vec![
            ResourceTimingEntry::new("https://cdn.example/app.js", "script", 4096, 3.0),
            ResourceTimingEntry::new("https://cdn.example/webllm.wasm", "fetch", 3_072_000, 900.0),
        ]),
        ..FakeHost::starting_at(0.0)
    });
    // t0 = 0; tokens at 100, 120, 140, 160
    let ask = FakeAsk::new(
        &host,
        5.0,
        Behavior::Stream(vec![
            ("The", 100.0),
            (" answer", 20.0),
            (" is", 20.0),
            (" 42", 20.0),
        ]),
    );

    let collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host)
        .with_config(config())
        .build()
        .unwrap();

    let sample = collector
        .sample_exchange("What is the answer?")
        .await
        .unwrap();
    assert!(sample.streamed);
    assert_eq!(sample.token_count, 4);
    assert_eq!(sample.ttft, Some(100.0));
    assert_eq!(sample.tpot, Some(20.0));
    assert_eq!(sample.total_gen_time, 160.0);
    assert!((sample.throughput.unwrap() - 25.0).abs() < 1e-9);
    assert_eq!(sample.script_transfer_size, Some(3000.0));
    assert_eq!(sample.response, "The answer is 42");
}

#[tokio::test]
async fn unstreamed_sample_falls_back_to_word_count() {
    let host = Arc::new(FakeHost::starting_at(0.0));
    let ask = FakeAsk::new(&host, 50.0, Behavior::Respond("hello world"));

    let collector = MetricsCollector::builder()
        .with_ask(ask)
        .with_host(host)
        .with_config(config())
        .build()
        .unwrap();

    let sample = collector.sample_exchange("Say hello").await.unwrap();
    assert!(!sample.streamed);
    assert_eq!(sample.token_count, 2);
    assert_eq!(sample.ttft, Some(50.0));
    assert_eq!(sample.tpot, None);
    assert_eq!(sample.total_gen_time, 50.0);
    assert!(sample.heap_used.is_none());
    assert!(sample.script_transfer_size.is_none());
}
