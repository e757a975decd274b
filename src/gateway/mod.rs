//! Provider gateway for chat completions.

pub mod error;
pub mod openai;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use openai::ChatProvider;
use usage::{ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

pub struct ProviderGateway<P: ChatProvider, U: UsageSinkTrait> {
    provider: P,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

#[async_trait::async_trait]
impl<P: ChatProvider, U: UsageSinkTrait> ChatGateway for ProviderGateway<P, U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<P: ChatProvider, U: UsageSinkTrait> ProviderGateway<P, U> {
    pub fn with_config(provider: P, usage_sink: Arc<U>, config: GatewayConfig) -> Self {
        Self {
            provider,
            usage_sink,
            config,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            let start = Instant::now();
            match self.provider.chat(&req).await {
                Ok(resp) => {
                    let record = self
                        .base_record(&req, attempt)
                        .tokens(resp.input_tokens, resp.output_tokens)
                        .latency(resp.latency.as_millis() as u64);
                    self.usage_sink.record(record).await;
                    return Ok(resp);
                }
                Err(err) => {
                    let record = self
                        .base_record(&req, attempt)
                        .latency(start.elapsed().as_millis() as u64)
                        .error(err.code());
                    self.usage_sink.record(record).await;

                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }

                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    tracing::warn!(
                        caller = req.attribution.caller,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        request_id = err.request_id().unwrap_or("-"),
                        error = %err,
                        "retrying chat completion"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::provider("gateway", "unknown error", false)))
    }

    fn base_record(&self, req: &ChatRequest, attempt: u32) -> ProviderCallRecord {
        ProviderCallRecord::new(
            req.model.provider(),
            "chat/completions",
            req.model.model_id(),
            req.attribution.caller,
        )
        .run(req.attribution.run_id)
        .attempt(attempt)
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 9), Duration::from_millis(3200));
    }
}
