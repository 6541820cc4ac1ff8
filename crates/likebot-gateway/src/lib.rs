//! # Likebot Gateway
//!
//! Client for the external like API. One invocation is one attempt: a
//! bounded timeout, no retries — the scheduler retries failed targets
//! on its next cycle, not here. Every failure mode (network error,
//! timeout, non-2xx, unexpected payload) collapses into an
//! unsuccessful [`LikeOutcome`] with a short message.

use async_trait::async_trait;
use likebot_core::config::GatewayConfig;
use serde::Deserialize;
use std::time::Duration;

/// Result of one like attempt against the external API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeOutcome {
    pub success: bool,
    pub message: String,
}

impl LikeOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// The external side-effecting action, abstracted so the runner and
/// service can be tested against a scripted implementation.
#[async_trait]
pub trait LikeGateway: Send + Sync {
    /// Apply one like to the target. Never panics; transport problems
    /// become unsuccessful outcomes.
    async fn invoke(&self, target: &str) -> LikeOutcome;
}

/// Body shape the like API returns on most responses.
#[derive(Debug, Deserialize)]
struct ApiBody {
    success: Option<bool>,
    message: Option<String>,
    msg: Option<String>,
}

/// reqwest-backed gateway.
pub struct HttpLikeGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpLikeGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Interpret a response body: JSON `{success, message|msg}` when
    /// the API behaves, HTTP status + truncated text when it does not.
    fn parse_body(status_ok: bool, body: &str) -> LikeOutcome {
        match serde_json::from_str::<ApiBody>(body) {
            Ok(parsed) => {
                let success = parsed.success.unwrap_or(status_ok);
                let message = parsed
                    .message
                    .or(parsed.msg)
                    .unwrap_or_else(|| truncate(body, 200));
                LikeOutcome { success, message }
            }
            Err(_) => LikeOutcome {
                success: status_ok,
                message: truncate(body, 200),
            },
        }
    }
}

#[async_trait]
impl LikeGateway for HttpLikeGateway {
    async fn invoke(&self, target: &str) -> LikeOutcome {
        let request = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("uid", target),
                ("server_name", self.config.server_name.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .timeout(Duration::from_secs(self.config.timeout_secs));

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                tracing::warn!("⏱️ Like API timed out for target {target}");
                return LikeOutcome::failed(format!(
                    "timed out after {}s",
                    self.config.timeout_secs
                ));
            }
            Err(e) => {
                tracing::warn!("🌐 Like API unreachable for target {target}: {e}");
                return LikeOutcome::failed("network error");
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let outcome = Self::parse_body(status.is_success(), &body);
        if outcome.success {
            tracing::debug!("✅ Like sent to target {target}");
        } else {
            tracing::warn!("❌ Like API error for target {target}: HTTP {status}");
        }
        outcome
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
