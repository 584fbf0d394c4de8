//! Error types for the signaling client

/// Result type alias using the client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating a Babelcast audio session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A message could not be delivered because the signaling channel never
    /// opened within the retry window, or has already closed
    #[error("Signaling channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// The remote description was empty or could not be applied
    #[error("Session description error: {0}")]
    DescriptionError(String),

    /// Offer creation or local description setup failed
    #[error("Negotiation error: {0}")]
    NegotiationError(String),

    /// The capture device was denied or is unavailable
    #[error("Media access error: {0}")]
    MediaAccessError(String),

    /// The backend sent an explicit `error` message
    #[error("Backend error: {0}")]
    BackendError(String),

    /// The publisher left the channel while we were attached
    #[error("Channel closed remotely: {0}")]
    ChannelClosedRemotely(String),

    /// Channel name is empty or contains characters the backend rejects
    #[error("Invalid channel name: {0}")]
    InvalidChannelName(String),

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation is not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable
    ///
    /// Only a send on a channel that is not open yet gets another attempt;
    /// every other failure needs an explicit reload from the user.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ChannelUnavailable(_))
    }

    /// Check if this error should be shown to the user
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::DescriptionError(_)
                | Error::MediaAccessError(_)
                | Error::BackendError(_)
                | Error::ChannelClosedRemotely(_)
                | Error::InvalidChannelName(_)
        )
    }

    /// Check if this error ends the active session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DescriptionError(_)
                | Error::NegotiationError(_)
                | Error::MediaAccessError(_)
                | Error::BackendError(_)
                | Error::ChannelClosedRemotely(_)
                | Error::WebRtcError(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}
