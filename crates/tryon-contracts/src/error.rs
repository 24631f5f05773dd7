use thiserror::Error;

pub type StudioResult<T> = Result<T, StudioError>;

/// Failure classes surfaced by the studio.
///
/// `InvalidInput` is raised before any remote call and shown inline.
/// `GenerationFailed` means the model answered without a usable image.
/// `Transport` carries the network/API error text verbatim.
/// `Persistence` is only ever logged; callers fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Invalid base64 string for image: {0}")]
    MalformedEncoding(String),
    #[error("{0}")]
    GenerationFailed(String),
    #[error("{0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Persistence(String),
}

impl StudioError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::MalformedEncoding(_) => "malformed_encoding",
            Self::GenerationFailed(_) => "generation_failed",
            Self::Transport(_) => "transport",
            Self::Persistence(_) => "persistence",
        }
    }

    /// Remote failures leave the workflow untouched and may be retried by hand.
    pub fn is_retryable_by_user(&self) -> bool {
        matches!(self, Self::GenerationFailed(_) | Self::Transport(_))
    }
}
