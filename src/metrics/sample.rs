//! Streaming-derived metrics for a single prompt/response exchange

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::format::{format_kilobytes, format_megabytes, format_time};
use crate::ask::TokenObserver;
use crate::host::HostEnvironment;

/// Token arrival times observed during one exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenTiming {
    pub first_token: Option<f64>,
    pub last_token: Option<f64>,
    pub token_count: usize,
    /// Whether the counts came from streamed tokens rather than the word-count fallback
    pub streamed: bool,
}

impl TokenTiming {
    /// Timing for a response that arrived without any streaming signal.
    ///
    /// The whole response is treated as arriving at `end`, and its whitespace
    /// word count stands in for the token count. An empty response counts as
    /// zero words, so it yields no throughput.
    pub fn unstreamed(response: &str, end: f64) -> Self {
        Self {
            first_token: Some(end),
            last_token: Some(end),
            token_count: response.split_whitespace().count(),
            streamed: false,
        }
    }

    fn observe(&mut self, now: f64) {
        self.token_count += 1;
        if self.first_token.is_none() {
            self.first_token = Some(now);
        }
        self.last_token = Some(now);
        self.streamed = true;
    }
}

/// Token observer stamping each token with the host clock
pub struct StreamTracker<'a> {
    host: &'a dyn HostEnvironment,
    timing: Mutex<TokenTiming>,
}

impl<'a> StreamTracker<'a> {
    pub fn new(host: &'a dyn HostEnvironment) -> Self {
        Self {
            host,
            timing: Mutex::new(TokenTiming::default()),
        }
    }

    pub fn token_count(&self) -> usize {
        self.timing.lock().token_count
    }

    /// Final timing, falling back to the response word count when nothing streamed
    pub fn finish(self, response: &str, end: f64) -> TokenTiming {
        let timing = self.timing.into_inner();
        if timing.token_count == 0 {
            TokenTiming::unstreamed(response, end)
        } else {
            timing
        }
    }
}

impl TokenObserver for StreamTracker<'_> {
    fn on_token(&self, _token: &str) {
        let now = self.host.now_ms();
        self.timing.lock().observe(now);
    }
}

/// Metrics derived from one streamed (or fallback) exchange. Times in ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSample {
    pub version: String,
    pub start: f64,
    /// Time to first token
    #[serde(rename = "TTFT")]
    pub ttft: Option<f64>,
    /// Mean inter-token latency after the first token
    #[serde(rename = "TPOT")]
    pub tpot: Option<f64>,
    pub total_gen_time: f64,
    /// Tokens per second of generation time
    pub throughput: Option<f64>,
    pub token_count: usize,
    pub streamed: bool,
    /// Heap used before the call, in MB
    #[serde(rename = "jsHeapUsed")]
    pub heap_used: Option<f64>,
    /// Model runtime resource size, in KB
    pub script_transfer_size: Option<f64>,
    pub response: String,
}

impl BenchmarkSample {
    pub fn derive(
        version: impl Into<String>,
        start: f64,
        end: f64,
        timing: TokenTiming,
        response: String,
    ) -> Self {
        let ttft = timing.first_token.map(|first| first - start);

        let total_gen_time = match timing.last_token {
            Some(last) => last - start,
            None => end - start,
        };

        let tpot = match (timing.streamed, timing.first_token, timing.last_token) {
            (true, Some(first), Some(last)) if timing.token_count > 1 => {
                Some((last - first) / (timing.token_count - 1) as f64)
            }
            _ => None,
        };

        let throughput = if timing.token_count > 0 && total_gen_time > 0.0 {
            Some(timing.token_count as f64 / (total_gen_time / 1000.0))
        } else {
            None
        };

        Self {
            version: version.into(),
            start,
            ttft,
            tpot,
            total_gen_time,
            throughput,
            token_count: timing.token_count,
            streamed: timing.streamed,
            heap_used: None,
            script_transfer_size: None,
            response,
        }
    }
}

impl fmt::Display for BenchmarkSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version:          {}", self.version)?;
        writeln!(f, "TTFT:             {}", format_time(self.ttft))?;
        writeln!(f, "TPOT:             {}", format_time(self.tpot))?;
        writeln!(
            f,
            "Generation Time:  {}",
            format_time(Some(self.total_gen_time))
        )?;
        match self.throughput {
            Some(tps) => writeln!(f, "Throughput:       {:.2} tok/s", tps)?,
            None => writeln!(f, "Throughput:       N/A")?,
        }
        let source = if self.streamed { "streamed" } else { "word count" };
        writeln!(f, "Tokens:           {} ({})", self.token_count, source)?;
        writeln!(f, "Memory Used:      {}", format_megabytes(self.heap_used))?;
        write!(
            f,
            "Runtime Size:     {}",
            format_kilobytes(self.script_transfer_size)
        )
    }
}
