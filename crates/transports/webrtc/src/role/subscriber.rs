//! Subscribing to a channel
//!
//! The receive-only offer is created the moment the flow starts, while the
//! directory is still being polled:
//!
//! ```text
//! Idle -> AwaitingDirectory -> AwaitingChannelPick -> Negotiating
//!      -> AwaitingSessionAck -> Connected
//! ```
//!
//! `AwaitingSessionAck` only appears when the backend is configured to
//! acknowledge descriptions with `session_received`.

use super::{report_engine_event, set_state, ConnectionState, FlowContext, Role, RoleFlow};
use crate::config::{ClientConfig, GatheringMode};
use crate::directory::{ChannelDirectory, DirectoryUpdate};
use crate::peer::{EngineEvent, NegotiationSession, NegotiationState, OfferOptions, TransportEngine};
use crate::signaling::{validate_channel_name, ChannelMessage, MessageKind, SubscriberConnectParams};
use crate::ui::{Intent, UiEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SUBSCRIPTIONS: &[MessageKind] = &[
    MessageKind::Channels,
    MessageKind::SdAnswer,
    MessageKind::IceCandidate,
    MessageKind::Info,
    MessageKind::Error,
    MessageKind::ChannelClosed,
    MessageKind::SessionReceived,
    MessageKind::Msg,
];

/// Subscriber role flow
pub struct SubscriberFlow {
    engine: Arc<dyn TransportEngine>,
    mode: GatheringMode,
    require_session_ack: bool,
    session: Option<NegotiationSession>,
    directory: ChannelDirectory,
    state: ConnectionState,
    channel_name: Option<String>,
    /// Description sent, `session_received` still outstanding
    awaiting_ack: bool,
}

impl SubscriberFlow {
    /// Create an idle subscriber flow
    pub fn new(engine: Arc<dyn TransportEngine>, config: &ClientConfig) -> Self {
        Self {
            engine,
            mode: config.gathering_mode,
            require_session_ack: config.require_session_ack,
            session: None,
            directory: ChannelDirectory::new(config.directory_poll_interval()),
            state: ConnectionState::Idle,
            channel_name: None,
            awaiting_ack: false,
        }
    }

    /// Picked channel
    pub fn channel_name(&self) -> Option<&str> {
        self.channel_name.as_deref()
    }

    /// Channel directory
    pub fn directory(&self) -> &ChannelDirectory {
        &self.directory
    }

    /// Negotiation state, if a session exists
    pub fn negotiation_state(&self) -> Option<NegotiationState> {
        self.session.as_ref().map(NegotiationSession::state)
    }

    fn set_state(&mut self, next: ConnectionState, cx: &FlowContext<'_>) {
        set_state(&mut self.state, next, Role::Subscriber, cx.ui);
    }

    /// State implied by the negotiation and the acknowledgement gate
    fn settle_state(&mut self, cx: &FlowContext<'_>) {
        if self.state.is_terminal() || self.channel_name.is_none() {
            return;
        }
        let next = if self.awaiting_ack {
            ConnectionState::AwaitingSessionAck
        } else if self.negotiation_state() == Some(NegotiationState::Connected) {
            ConnectionState::Connected
        } else {
            ConnectionState::Negotiating
        };
        self.set_state(next, cx);
    }

    /// Send the description once a channel is picked and the session is ready
    async fn send_description_if_ready(&mut self, cx: &mut FlowContext<'_>) {
        if self.channel_name.is_none() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.send_description(cx.channel).await {
            self.description_sent(cx);
        }
    }

    fn description_sent(&mut self, cx: &FlowContext<'_>) {
        if self.require_session_ack {
            self.awaiting_ack = true;
        }
        self.settle_state(cx);
    }

    async fn fail(&mut self, err: Error, cx: &mut FlowContext<'_>) -> Error {
        warn!("Subscriber failed: {}", err);
        self.set_state(ConnectionState::Failed, cx);
        self.release().await;
        cx.ui.emit(UiEvent::ChannelPickVisible(false));
        cx.ui.emit(UiEvent::SpinnerVisible(false));
        err
    }

    async fn release(&mut self) {
        self.directory.stop();
        if let Some(session) = self.session.as_mut() {
            session.close().await;
        }
        self.awaiting_ack = false;
    }

    fn on_channels(&mut self, channels: Vec<String>, cx: &mut FlowContext<'_>) {
        match self.directory.on_channels(channels) {
            DirectoryUpdate::Available(channels) => {
                cx.ui.emit(UiEvent::Channels(channels));
                if self.state == ConnectionState::AwaitingDirectory {
                    self.set_state(ConnectionState::AwaitingChannelPick, cx);
                    cx.ui.emit(UiEvent::ChannelPickVisible(true));
                }
            }
            DirectoryUpdate::Empty => cx.ui.emit(UiEvent::ChannelsEmpty),
        }
    }

    async fn pick(&mut self, channel: String, cx: &mut FlowContext<'_>) -> Result<()> {
        if self.awaiting_ack {
            return Err(Error::InvalidState(
                "waiting for the backend to acknowledge the current session".to_string(),
            ));
        }
        if self.state != ConnectionState::AwaitingChannelPick {
            return Err(Error::InvalidState(format!(
                "channel pick not expected in state {}",
                self.state
            )));
        }
        validate_channel_name(&channel)?;
        if !self.directory.entries().contains(&channel) {
            debug!("Picked channel {} is not in the directory", channel);
        }

        info!("Subscribing to {}", channel);
        self.directory.stop();
        self.channel_name = Some(channel.clone());
        cx.ui.emit(UiEvent::ChannelPickVisible(false));
        cx.ui.emit(UiEvent::OutputVisible(true));
        cx.ui.emit(UiEvent::SpinnerVisible(true));

        // A finished batched description rides along with the subscribe request
        let attached = match (self.mode, self.session.as_mut()) {
            (GatheringMode::Batched, Some(session)) => session.take_ready_description().await,
            _ => None,
        };
        let has_description = attached.is_some();

        cx.channel.send_when_ready(ChannelMessage::ConnectSubscriber(SubscriberConnectParams {
            channel,
            session_description: attached,
        }));

        if has_description {
            self.description_sent(cx);
        } else {
            self.set_state(ConnectionState::Negotiating, cx);
            self.send_description_if_ready(cx).await;
        }
        Ok(())
    }

    fn names_our_channel(&self, name: &str) -> bool {
        self.channel_name.as_deref() == Some(name)
    }
}

#[async_trait]
impl RoleFlow for SubscriberFlow {
    fn role(&self) -> Role {
        Role::Subscriber
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn subscriptions(&self) -> &'static [MessageKind] {
        SUBSCRIPTIONS
    }

    async fn start(&mut self, cx: &mut FlowContext<'_>) -> Result<()> {
        if self.state != ConnectionState::Idle {
            debug!("Subscriber already started");
            return Ok(());
        }

        let mut session =
            NegotiationSession::new(Arc::clone(&self.engine), self.mode, MessageKind::SessionSubscriber);
        let started = session.start(OfferOptions::receive_audio()).await;
        self.session = Some(session);
        if let Err(e) = started {
            let err = match e {
                Error::NegotiationError(_) => e,
                other => Error::NegotiationError(other.to_string()),
            };
            return Err(self.fail(err, cx).await);
        }

        self.set_state(ConnectionState::AwaitingDirectory, cx);
        self.directory.start(cx.now, cx.channel);
        Ok(())
    }

    async fn handle_message(&mut self, message: ChannelMessage, cx: &mut FlowContext<'_>) -> Result<()> {
        if self.state.is_terminal() {
            debug!("Subscriber is {}, ignoring {}", self.state, message.kind());
            return Ok(());
        }

        match message {
            ChannelMessage::Channels(channels) => self.on_channels(channels, cx),
            ChannelMessage::SdAnswer(answer) => {
                let Some(session) = self.session.as_mut() else {
                    warn!("Answer received without a negotiation session");
                    return Ok(());
                };
                if let Err(e) = session.apply_answer(&answer).await {
                    return Err(self.fail(e, cx).await);
                }
                self.settle_state(cx);
            }
            ChannelMessage::IceCandidate(candidate) => {
                if let Some(session) = self.session.as_mut() {
                    session.add_remote_candidate(candidate).await?;
                }
            }
            ChannelMessage::SessionReceived => {
                if self.awaiting_ack {
                    debug!("Backend acknowledged our session");
                    self.awaiting_ack = false;
                    self.settle_state(cx);
                }
            }
            ChannelMessage::Error(text) => {
                return Err(self.fail(Error::BackendError(text), cx).await);
            }
            ChannelMessage::ChannelClosed(name) => {
                if self.names_our_channel(&name) {
                    return Err(self.fail(Error::ChannelClosedRemotely(name), cx).await);
                }
                debug!("Channel {} closed, not ours", name);
            }
            ChannelMessage::Info(text) => cx.ui.emit(UiEvent::Info(text)),
            ChannelMessage::Msg(chat) => cx.ui.emit(UiEvent::Chat {
                sender: chat.sender,
                message: chat.message,
            }),
            ChannelMessage::Malformed {
                kind: MessageKind::SdAnswer,
                reason,
            } => {
                let err = match self.session.as_mut() {
                    Some(session) => session.reject_answer(reason),
                    None => Error::DescriptionError(reason),
                };
                return Err(self.fail(err, cx).await);
            }
            ChannelMessage::Malformed { reason, .. } => {
                return Err(Error::SerializationError(reason));
            }
            other => debug!("Subscriber ignoring {}", other.kind()),
        }

        Ok(())
    }

    async fn handle_engine_event(&mut self, event: EngineEvent, cx: &mut FlowContext<'_>) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }

        if report_engine_event(&event, self.session.as_mut(), cx.ui) {
            let err = Error::WebRtcError("transport connection lost".to_string());
            return Err(self.fail(err, cx).await);
        }

        if let Some(session) = self.session.as_mut() {
            session.on_engine_event(&event, cx.channel).await;
        }
        self.send_description_if_ready(cx).await;
        Ok(())
    }

    async fn handle_intent(&mut self, intent: Intent, cx: &mut FlowContext<'_>) -> Result<()> {
        match intent {
            Intent::PickChannel(channel) => self.pick(channel, cx).await,
            Intent::SubmitCredentials { .. } | Intent::SetMicEnabled(_) => {
                warn!("Subscriber ignores publisher intents");
                Ok(())
            }
            Intent::Connect | Intent::Reload => Ok(()),
        }
    }

    async fn on_tick(&mut self, cx: &mut FlowContext<'_>) -> Result<()> {
        self.directory.poll_due(cx.now, cx.channel);
        Ok(())
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.directory.next_deadline()
    }

    async fn teardown(&mut self, cx: &mut FlowContext<'_>) {
        info!("Tearing down subscriber");
        self.release().await;
        if !self.state.is_terminal() {
            self.set_state(ConnectionState::Closed, cx);
        }
        cx.ui.emit(UiEvent::ChannelPickVisible(false));
        cx.ui.emit(UiEvent::OutputVisible(false));
    }
}
