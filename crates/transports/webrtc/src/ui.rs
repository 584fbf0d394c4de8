//! Presentation bridge
//!
//! Flows report what the user should see as [`UiEvent`]s and receive what
//! the user did as [`Intent`]s. Rendering is up to the embedder.

use crate::peer::{IceConnectionState, MediaKind};
use crate::role::ConnectionState;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Presentation update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Role connection state changed
    StateChanged(ConnectionState),
    /// Channels available to pick
    Channels(Vec<String>),
    /// The directory is empty for now
    ChannelsEmpty,
    /// Ask for channel credentials
    CredentialsRequired {
        /// The backend insists on a non-empty password
        password: bool,
    },
    /// Show or hide the channel picker
    ChannelPickVisible(bool),
    /// Show or hide the media output area
    OutputVisible(bool),
    /// Show or hide the progress indicator
    SpinnerVisible(bool),
    /// Microphone mute state
    MicEnabled(bool),
    /// Transport connection state changed
    TransportState(IceConnectionState),
    /// A remote track arrived
    RemoteTrack {
        /// Track kind
        kind: MediaKind,
        /// Track identifier
        id: String,
    },
    /// Chat message from another participant
    Chat {
        /// Sender display name
        sender: String,
        /// Message body
        message: String,
    },
    /// Informational text from the backend
    Info(String),
    /// Error text for the user
    Error(String),
}

/// User action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Begin the role flow
    Connect,
    /// Publish with these credentials
    SubmitCredentials {
        /// Channel name
        channel: String,
        /// Channel password, possibly empty
        password: String,
    },
    /// Subscribe to a channel from the directory
    PickChannel(String),
    /// Mute or unmute the microphone
    SetMicEnabled(bool),
    /// Tear everything down so a fresh attempt can start
    Reload,
}

/// Receives presentation updates
pub trait UiBridge: Send + Sync {
    /// Deliver one update
    fn emit(&self, event: UiEvent);
}

/// Bridge forwarding updates over a channel
#[derive(Debug, Clone)]
pub struct ChannelUiBridge {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelUiBridge {
    /// Create a bridge and the receiving end of its updates
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UiBridge for ChannelUiBridge {
    fn emit(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

/// Bridge rendering updates as log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUiBridge;

impl UiBridge for TracingUiBridge {
    fn emit(&self, event: UiEvent) {
        match event {
            UiEvent::StateChanged(state) => info!(target: "babelcast::ui", "State: {}", state),
            UiEvent::Channels(channels) => {
                info!(target: "babelcast::ui", "Channels: {}", channels.join(", "))
            }
            UiEvent::ChannelsEmpty => info!(target: "babelcast::ui", "No channels yet"),
            UiEvent::CredentialsRequired { password: true } => {
                info!(target: "babelcast::ui", "Password required for this channel")
            }
            UiEvent::CredentialsRequired { password: false } => {
                info!(target: "babelcast::ui", "Enter a channel name")
            }
            UiEvent::ChannelPickVisible(_) | UiEvent::OutputVisible(_) | UiEvent::SpinnerVisible(_) => {}
            UiEvent::MicEnabled(enabled) => {
                info!(target: "babelcast::ui", "Microphone {}", if enabled { "on" } else { "off" })
            }
            UiEvent::TransportState(state) => info!(target: "babelcast::ui", "ICE {}", state),
            UiEvent::RemoteTrack { kind, id } => {
                info!(target: "babelcast::ui", "Receiving {} track {}", kind, id)
            }
            UiEvent::Chat { sender, message } => {
                info!(target: "babelcast::ui", "[{}] {}", sender, message)
            }
            UiEvent::Info(text) => info!(target: "babelcast::ui", "Info: {}", text),
            UiEvent::Error(text) => error!(target: "babelcast::ui", "Error: {}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_bridge_forwards_in_order() {
        let (bridge, mut rx) = ChannelUiBridge::new();
        bridge.emit(UiEvent::SpinnerVisible(true));
        bridge.emit(UiEvent::Info("hello".to_string()));

        assert_eq!(rx.try_recv().unwrap(), UiEvent::SpinnerVisible(true));
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Info("hello".to_string()));
    }

    #[test]
    fn test_channel_bridge_survives_dropped_receiver() {
        let (bridge, rx) = ChannelUiBridge::new();
        drop(rx);
        bridge.emit(UiEvent::ChannelsEmpty);
    }
}
