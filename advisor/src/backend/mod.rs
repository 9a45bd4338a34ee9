//! Model backends: one narrow capability, one implementation per provider.

mod anthropic;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

use crate::prompt::ModelRequest;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider response had no text content")]
    EmptyResponse,

    #[error("missing api key for {0}")]
    MissingApiKey(&'static str),

    #[error("unknown model provider: {0}")]
    UnknownProvider(String),
}

/// Sends one composed request and returns the raw model text.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, request: &ModelRequest) -> Result<String, BackendError>;
}

#[async_trait]
impl<T: ModelBackend + ?Sized> ModelBackend for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn send(&self, request: &ModelRequest) -> Result<String, BackendError> {
        (**self).send(request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl std::str::FromStr for Provider {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(BackendError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
    /// Overrides the provider's public endpoint.
    pub base_url: Option<String>,
    /// Transport-level timeout. The validator applies its own per-call timeout on top.
    pub timeout: Duration,
}

/// Picks the implementation for the configured provider.
pub fn build_backend(config: &BackendConfig) -> Result<Box<dyn ModelBackend>, BackendError> {
    let backend: Box<dyn ModelBackend> = match config.provider {
        Provider::OpenAi => {
            let key = config
                .api_key
                .clone()
                .ok_or(BackendError::MissingApiKey("openai"))?;
            Box::new(OpenAiBackend::new(
                config.base_url.clone().unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
                key,
                config.model.clone(),
                config.timeout,
            )?)
        }
        Provider::Anthropic => {
            let key = config
                .api_key
                .clone()
                .ok_or(BackendError::MissingApiKey("anthropic"))?;
            Box::new(AnthropicBackend::new(
                config.base_url.clone().unwrap_or_else(|| anthropic::DEFAULT_BASE_URL.to_string()),
                key,
                config.model.clone(),
                config.timeout,
            )?)
        }
    };
    Ok(backend)
}

fn http_client(timeout: Duration) -> Result<Client, BackendError> {
    Ok(Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .build()?)
}

/// Turns a non-success response into [`BackendError::Status`] with the body attached.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: body.chars().take(512).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: Provider, api_key: Option<&str>) -> BackendConfig {
        BackendConfig {
            provider,
            model: "m".into(),
            api_key: api_key.map(str::to_string),
            base_url: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!(matches!(
            "local".parse::<Provider>(),
            Err(BackendError::UnknownProvider(p)) if p == "local"
        ));
    }

    #[test]
    fn factory_requires_key() {
        assert!(matches!(
            build_backend(&config(Provider::OpenAi, None)),
            Err(BackendError::MissingApiKey("openai"))
        ));
        let backend = build_backend(&config(Provider::Anthropic, Some("k"))).unwrap();
        assert_eq!(backend.name(), "anthropic");
    }
}
