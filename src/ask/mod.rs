//! The ask capability: the assistant's prompt/response entry point

mod command;

pub use command::{CommandAsk, PromptMode};

use crate::error::BoxError;

/// Receives streamed tokens while an ask call is in flight
pub trait TokenObserver: Send + Sync {
    fn on_token(&self, token: &str);
}

/// Observer for calls that only care about the final response
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreTokens;

impl TokenObserver for IgnoreTokens {
    fn on_token(&self, _token: &str) {}
}

/// Asynchronous `(prompt) -> response` function of the assistant under test.
///
/// Implementations that stream should call `tokens.on_token` once per
/// generated token before returning. Implementations that cannot stream
/// simply never call it.
#[async_trait::async_trait]
pub trait AskCapability: Send + Sync {
    async fn ask(&self, prompt: &str, tokens: &dyn TokenObserver) -> Result<String, BoxError>;
}
