//! Hosted LLM providers for ToolRelay.
//!
//! Both implement `toolrelay_core::Provider`; [`build_provider`] picks one
//! from configuration.

pub mod anthropic;
pub mod gemini;
mod http;

use std::sync::Arc;
use toolrelay_config::{AppConfig, ConfigError, ProviderKind};
use toolrelay_core::Provider;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;

/// Build the configured provider.
///
/// Fails with `ConfigError::MissingValue` when no API key is available.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ConfigError> {
    let api_key = config.require_api_key()?;
    let provider: Arc<dyn Provider> = match config.provider {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key)),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key)),
    };
    tracing::debug!(provider = provider.name(), model = config.effective_model(), "Provider ready");
    Ok(provider)
}
