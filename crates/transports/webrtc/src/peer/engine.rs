//! Transport engine interface
//!
//! The engine is the local transport session: it produces offers, applies
//! descriptions and candidates, and reports discovery, track, and
//! connection-state events on a channel owned by whoever created it.

use crate::media::AudioSink;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use crate::signaling::protocol::{IceCandidate, SdpType, SessionDescription};

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio
    Audio,
    /// Video
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Transport connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    /// Not started
    New,
    /// Checking candidate pairs
    Checking,
    /// A usable pair was found
    Connected,
    /// Checking finished
    Completed,
    /// No usable pair
    Failed,
    /// Connectivity lost
    Disconnected,
    /// Shut down
    Closed,
}

impl IceConnectionState {
    /// Whether the session can no longer carry media
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            IceConnectionState::Failed | IceConnectionState::Disconnected
        )
    }

    /// Whether media is flowing
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            IceConnectionState::Connected | IceConnectionState::Completed
        )
    }
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Event reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A local candidate was discovered
    CandidateFound(IceCandidate),
    /// Discovery finished (the null candidate)
    GatheringComplete,
    /// A remote track arrived
    TrackAdded {
        /// Track kind
        kind: MediaKind,
        /// Track identifier
        id: String,
    },
    /// Transport connection state changed
    ConnectionStateChanged(IceConnectionState),
}

/// Options for offer creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferOptions {
    /// Ask the remote side to send audio
    pub receive_audio: bool,
}

impl OfferOptions {
    /// Offer that receives audio
    pub fn receive_audio() -> Self {
        Self {
            receive_audio: true,
        }
    }
}

/// Local transport session
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// Add an outgoing audio track and return its sample sink
    async fn add_audio_track(&self) -> Result<Arc<dyn AudioSink>>;

    /// Create a local offer
    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription>;

    /// Apply the local description; discovery begins once this succeeds
    async fn set_local_description(&self, description: &SessionDescription) -> Result<()>;

    /// Current local description, including any candidates gathered so far
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Apply the remote description
    ///
    /// Fails with [`crate::Error::DescriptionError`] on malformed input.
    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()>;

    /// Apply a remote candidate
    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    /// Close the session
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(IceConnectionState::Failed.is_terminal_failure());
        assert!(IceConnectionState::Disconnected.is_terminal_failure());
        assert!(!IceConnectionState::Closed.is_terminal_failure());
        assert!(IceConnectionState::Completed.is_connected());
        assert!(!IceConnectionState::Checking.is_connected());
    }

    #[test]
    fn test_display() {
        assert_eq!(IceConnectionState::Checking.to_string(), "checking");
        assert_eq!(MediaKind::Audio.to_string(), "audio");
    }
}
