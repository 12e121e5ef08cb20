use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credential. The transport has already cleared
    /// the store and routed to login by the time this is returned.
    #[error("Unauthorized")]
    Unauthorized,

    /// Non-success response. The raw body is preserved so callers can probe
    /// it for a human-readable message.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
