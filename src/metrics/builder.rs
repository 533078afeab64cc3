use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::MetricsCollector;
use crate::ask::AskCapability;
use crate::config::BenchConfig;
use crate::error::Result;
use crate::host::{HostEnvironment, SystemHost};

/// Builder for constructing a MetricsCollector instance
pub struct CollectorBuilder {
    ask: Option<Arc<dyn AskCapability>>,
    host: Option<Arc<dyn HostEnvironment>>,
    config: Option<BenchConfig>,
    cancel: Option<CancellationToken>,
}

impl CollectorBuilder {
    pub fn new() -> Self {
        Self {
            ask: None,
            host: None,
            config: None,
            cancel: None,
        }
    }

    /// Set the ask capability under test
    pub fn with_ask(mut self, ask: Arc<dyn AskCapability>) -> Self {
        self.ask = Some(ask);
        self
    }

    /// Set the host environment. Defaults to a [`SystemHost`].
    pub fn with_host(mut self, host: Arc<dyn HostEnvironment>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_config(mut self, config: BenchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share a cancellation token, e.g. one tied to a shutdown signal
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate the configuration and build the collector.
    ///
    /// A missing ask capability is not rejected here; the ask phase reports it.
    pub fn build(self) -> Result<MetricsCollector> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let host = self
            .host
            .unwrap_or_else(|| Arc::new(SystemHost::new()) as Arc<dyn HostEnvironment>);

        Ok(MetricsCollector::with_cancellation(
            self.ask,
            host,
            Arc::new(config),
            self.cancel.unwrap_or_default(),
        ))
    }
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
