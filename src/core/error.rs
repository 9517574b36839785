use thiserror::Error;

/// Why a listing fetch produced no items. Every variant is recoverable and
/// is handled at the cycle boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no session credentials observed yet")]
    NoCredentials,

    #[error("listing request failed with status {status}")]
    Http { status: u16 },

    #[error("malformed listing response: {0}")]
    MalformedResponse(String),

    #[error("listing request could not be sent: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NoCredentials => "no_credentials",
            FetchError::Http { .. } => "http",
            FetchError::MalformedResponse(_) => "malformed_response",
            FetchError::Transport(_) => "transport",
        }
    }
}
