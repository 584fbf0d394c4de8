//! Publisher and subscriber flows
//!
//! A flow owns its negotiation session and everything tied to it (capture,
//! directory). The client hands it the message channel and the UI bridge
//! through a [`FlowContext`] for each event instead of the flow holding on
//! to them.

pub mod publisher;
pub mod subscriber;

pub use publisher::PublisherFlow;
pub use subscriber::SubscriberFlow;

use crate::peer::{EngineEvent, NegotiationSession};
use crate::signaling::{ChannelMessage, MessageChannel, MessageKind};
use crate::ui::{Intent, UiBridge, UiEvent};
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::time::Instant;
use tracing::debug;

/// Which side of a channel this client is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends local audio into a channel
    Publisher,
    /// Receives audio from a channel
    Subscriber,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Publisher => f.write_str("publisher"),
            Role::Subscriber => f.write_str("subscriber"),
        }
    }
}

/// Role connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started
    Idle,
    /// Subscriber waiting for a non-empty directory
    AwaitingDirectory,
    /// Subscriber waiting for the user to pick a channel
    AwaitingChannelPick,
    /// Publisher waiting for the backend to accept its credentials
    AwaitingCredentials,
    /// Publisher accepted by the backend
    Authenticated,
    /// Description exchange in progress
    Negotiating,
    /// Subscriber waiting for `session_received`
    AwaitingSessionAck,
    /// Answer applied
    Connected,
    /// Torn down by the user or by channel close
    Closed,
    /// Terminal failure
    Failed,
}

impl ConnectionState {
    /// Whether the flow is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::AwaitingDirectory => "awaiting_directory",
            ConnectionState::AwaitingChannelPick => "awaiting_channel_pick",
            ConnectionState::AwaitingCredentials => "awaiting_credentials",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Negotiating => "negotiating",
            ConnectionState::AwaitingSessionAck => "awaiting_session_ack",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Collaborators lent to a flow for one event
pub struct FlowContext<'a> {
    /// Signaling channel
    pub channel: &'a mut MessageChannel,
    /// Presentation bridge
    pub ui: &'a dyn UiBridge,
    /// Current time
    pub now: Instant,
}

/// A role-specific flow driven by the client event loop
#[async_trait]
pub trait RoleFlow: Send {
    /// Which role this flow plays
    fn role(&self) -> Role;

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Inbound message kinds the flow wants
    fn subscriptions(&self) -> &'static [MessageKind];

    /// Begin the flow
    async fn start(&mut self, cx: &mut FlowContext<'_>) -> Result<()>;

    /// Handle an inbound signaling message
    async fn handle_message(&mut self, message: ChannelMessage, cx: &mut FlowContext<'_>) -> Result<()>;

    /// Handle an engine event
    async fn handle_engine_event(&mut self, event: EngineEvent, cx: &mut FlowContext<'_>) -> Result<()>;

    /// Handle a user intent
    async fn handle_intent(&mut self, intent: Intent, cx: &mut FlowContext<'_>) -> Result<()>;

    /// Run timer work that is due
    async fn on_tick(&mut self, _cx: &mut FlowContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Next time [`RoleFlow::on_tick`] has work to do
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// Close the session and release local media
    async fn teardown(&mut self, cx: &mut FlowContext<'_>);
}

/// Report track and transport-state events to the UI
///
/// Returns `true` when the transport state failed the session.
pub(crate) fn report_engine_event(
    event: &EngineEvent,
    session: Option<&mut NegotiationSession>,
    ui: &dyn UiBridge,
) -> bool {
    match event {
        EngineEvent::TrackAdded { kind, id } => {
            ui.emit(UiEvent::RemoteTrack {
                kind: *kind,
                id: id.clone(),
            });
            false
        }
        EngineEvent::ConnectionStateChanged(state) => {
            ui.emit(UiEvent::TransportState(*state));
            if state.is_connected() {
                ui.emit(UiEvent::SpinnerVisible(false));
            }
            session.map(|s| s.on_transport_state(*state)).unwrap_or(false)
        }
        EngineEvent::CandidateFound(_) => {
            ui.emit(UiEvent::SpinnerVisible(true));
            false
        }
        EngineEvent::GatheringComplete => {
            debug!("Candidate discovery complete");
            false
        }
    }
}

/// Update a flow's state, reporting real changes
pub(crate) fn set_state(current: &mut ConnectionState, next: ConnectionState, role: Role, ui: &dyn UiBridge) {
    if *current != next {
        debug!("{} state: {} -> {}", role, current, next);
        *current = next;
        ui.emit(UiEvent::StateChanged(next));
    }
}
