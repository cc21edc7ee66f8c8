//! Reasoning gateway abstraction.
//!
//! A gateway turns a rendered prompt into free text. Calls are single-attempt
//! and non-idempotent: the same prompt may produce different output, and no
//! retry is made on failure. Callers validate everything that comes back.

mod gemini;
pub mod mock;

pub use gemini::GeminiGateway;
pub use mock::ScriptedGateway;

use crate::config::GatewayConfig;
use crate::error::BoardError;
use crate::prompts::PromptKind;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Gateway failure modes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Not configured, unreachable, or timed out.
    #[error("reasoning gateway unavailable: {0}")]
    Unavailable(String),

    /// The service answered but the call failed.
    #[error("reasoning gateway call failed: {0}")]
    Failed(String),
}

/// Gateway result type alias.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<GatewayError> for BoardError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(reason) => BoardError::gateway_unavailable(reason),
            GatewayError::Failed(detail) => BoardError::gateway_error(detail),
        }
    }
}

/// External text-generation service.
#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Submit a prompt and return the raw response text.
    async fn analyze(&self, kind: PromptKind, prompt: &str) -> GatewayResult<String>;
}

/// Shared gateway handle. `None` means the gateway is disabled.
pub type SharedGateway = Option<Arc<dyn ReasoningGateway>>;

/// Build the configured gateway, or `None` when no credential is present.
pub fn from_config(config: &GatewayConfig) -> SharedGateway {
    let Some(api_key) = config.api_key() else {
        warn!(
            env = %config.api_key_env,
            "No reasoning gateway credential found; AI endpoints are disabled"
        );
        return None;
    };

    match GeminiGateway::new(config, api_key) {
        Ok(gateway) => {
            info!(model = %config.model, "Reasoning gateway configured");
            Some(Arc::new(gateway))
        }
        Err(e) => {
            warn!(error = %e, "Failed to configure reasoning gateway; AI endpoints are disabled");
            None
        }
    }
}
