use reqwest::StatusCode;

/// Failure talking to an external API (GroupMe or the feed service).
///
/// `Unauthorized` is kept distinct so callers can short-circuit and ask the
/// user to authenticate again instead of treating it as a transient error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{service} rejected the credentials; re-authenticate and try again")]
    Unauthorized { service: &'static str },

    #[error("{service} returned unexpected status {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {service}: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Map a non-success status to the matching error variant.
    pub fn from_status(service: &'static str, status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized { service }
        } else {
            ApiError::Status { service, status }
        }
    }

    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ApiError::Transport { service, source }
    }
}
