use thiserror::Error;

use crate::provider::ProviderId;

/// Failure of the outbound HTTP call itself (connect, timeout, body read).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::new(format!("{kind}: {err}"))
    }
}

/// Adapter-local failure. The aggregators drop the provider's contribution
/// and never surface these to their caller.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed with status {status}: {body}")]
    UpstreamHttp {
        provider: ProviderId,
        status: u16,
        body: String,
    },

    #[error("{provider} returned unusable data: {message}")]
    UpstreamData { provider: ProviderId, message: String },

    #[error("{provider} transport error: {source}")]
    Transport {
        provider: ProviderId,
        #[source]
        source: TransportError,
    },
}

impl ProviderError {
    pub fn data<S: Into<String>>(provider: ProviderId, message: S) -> Self {
        Self::UpstreamData {
            provider,
            message: message.into(),
        }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            Self::UpstreamHttp { provider, .. }
            | Self::UpstreamData { provider, .. }
            | Self::Transport { provider, .. } => *provider,
        }
    }
}
