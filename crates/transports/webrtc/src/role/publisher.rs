//! Publishing local audio into a channel
//!
//! Capture starts muted as soon as the flow starts so the offer carries an
//! audio track. The offer goes out as soon as it is ready; the credential
//! gate only controls when the microphone is unmuted:
//!
//! ```text
//! Idle -> AwaitingCredentials -> Authenticated -> Negotiating -> Connected
//! ```
//!
//! `password_required` keeps the flow in `AwaitingCredentials` and asks the
//! user again. The first `info` after a `connect_publisher` that is not an
//! ICE notice is the backend's acceptance. An `error` at any point fails the
//! flow.

use super::{report_engine_event, set_state, ConnectionState, FlowContext, Role, RoleFlow};
use crate::config::GatheringMode;
use crate::media::AudioCapture;
use crate::peer::{EngineEvent, NegotiationSession, NegotiationState, OfferOptions, TransportEngine};
use crate::signaling::{validate_channel_name, ChannelMessage, MessageKind, PublisherConnectParams};
use crate::ui::{Intent, UiEvent};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SUBSCRIPTIONS: &[MessageKind] = &[
    MessageKind::SdAnswer,
    MessageKind::IceCandidate,
    MessageKind::Info,
    MessageKind::Error,
    MessageKind::PasswordRequired,
    MessageKind::Msg,
];

/// Whether an `info` text is the backend relaying ICE connection progress
///
/// These arrive on the same kind as the publish acceptance but say nothing
/// about it, e.g. "ice connected" or "ice disconnected".
fn is_ice_notice(text: &str) -> bool {
    text.get(..4)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("ice "))
}

/// Publisher role flow
pub struct PublisherFlow {
    engine: Arc<dyn TransportEngine>,
    capture: Arc<dyn AudioCapture>,
    mode: GatheringMode,
    session: Option<NegotiationSession>,
    state: ConnectionState,
    channel_name: Option<String>,
    password_required: bool,
    /// A `connect_publisher` is waiting for the backend's verdict
    awaiting_ack: bool,
    authenticated: bool,
}

impl PublisherFlow {
    /// Create an idle publisher flow
    ///
    /// # Arguments
    ///
    /// * `engine` - Transport session for this attempt
    /// * `capture` - Local audio source
    /// * `mode` - Candidate gathering mode
    pub fn new(engine: Arc<dyn TransportEngine>, capture: Arc<dyn AudioCapture>, mode: GatheringMode) -> Self {
        Self {
            engine,
            capture,
            mode,
            session: None,
            state: ConnectionState::Idle,
            channel_name: None,
            password_required: false,
            awaiting_ack: false,
            authenticated: false,
        }
    }

    /// Channel the credentials were submitted for
    pub fn channel_name(&self) -> Option<&str> {
        self.channel_name.as_deref()
    }

    /// Whether the backend accepted the publish
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Negotiation state, if a session exists
    pub fn negotiation_state(&self) -> Option<NegotiationState> {
        self.session.as_ref().map(NegotiationSession::state)
    }

    fn set_state(&mut self, next: ConnectionState, cx: &FlowContext<'_>) {
        set_state(&mut self.state, next, Role::Publisher, cx.ui);
    }

    /// State implied by the credential gate and the negotiation
    fn settle_state(&mut self, cx: &FlowContext<'_>) {
        if self.state.is_terminal() || !self.authenticated {
            return;
        }
        let next = match self.negotiation_state() {
            Some(NegotiationState::Connected) => ConnectionState::Connected,
            Some(NegotiationState::AwaitingAnswer) => ConnectionState::Negotiating,
            _ => ConnectionState::Authenticated,
        };
        self.set_state(next, cx);
    }

    async fn send_description_if_ready(&mut self, cx: &mut FlowContext<'_>) {
        if let Some(session) = self.session.as_mut() {
            if session.send_description(cx.channel).await {
                self.settle_state(cx);
            }
        }
    }

    async fn fail(&mut self, err: Error, cx: &mut FlowContext<'_>) -> Error {
        warn!("Publisher failed: {}", err);
        self.set_state(ConnectionState::Failed, cx);
        self.release().await;
        cx.ui.emit(UiEvent::MicEnabled(false));
        cx.ui.emit(UiEvent::OutputVisible(false));
        cx.ui.emit(UiEvent::SpinnerVisible(false));
        err
    }

    async fn release(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.close().await;
        }
        self.capture.stop().await;
        self.awaiting_ack = false;
    }

    fn submit_credentials(&mut self, channel: String, password: String, cx: &mut FlowContext<'_>) -> Result<()> {
        if self.state != ConnectionState::AwaitingCredentials {
            return Err(Error::InvalidState(format!(
                "credentials not expected in state {}",
                self.state
            )));
        }

        validate_channel_name(&channel)?;

        if self.password_required && password.is_empty() {
            warn!("Channel {} needs a password, not resubmitting", channel);
            cx.ui.emit(UiEvent::CredentialsRequired { password: true });
            return Ok(());
        }

        info!("Requesting to publish into {}", channel);
        self.channel_name = Some(channel.clone());
        self.awaiting_ack = true;
        cx.channel
            .send_when_ready(ChannelMessage::ConnectPublisher(PublisherConnectParams { channel, password }));
        cx.ui.emit(UiEvent::OutputVisible(true));
        Ok(())
    }

    fn on_info(&mut self, text: String, cx: &mut FlowContext<'_>) {
        let notice = is_ice_notice(&text);
        cx.ui.emit(UiEvent::Info(text));

        if notice {
            debug!("ICE notice is not a publish acceptance");
            return;
        }

        if self.awaiting_ack && self.state == ConnectionState::AwaitingCredentials {
            info!("Publish accepted");
            self.awaiting_ack = false;
            self.authenticated = true;
            self.capture.set_enabled(true);
            cx.ui.emit(UiEvent::MicEnabled(true));
            self.set_state(ConnectionState::Authenticated, cx);
            self.settle_state(cx);
        }
    }
}

#[async_trait]
impl RoleFlow for PublisherFlow {
    fn role(&self) -> Role {
        Role::Publisher
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn subscriptions(&self) -> &'static [MessageKind] {
        SUBSCRIPTIONS
    }

    async fn start(&mut self, cx: &mut FlowContext<'_>) -> Result<()> {
        if self.state != ConnectionState::Idle {
            debug!("Publisher already started");
            return Ok(());
        }

        let sink = match self.engine.add_audio_track().await {
            Ok(sink) => sink,
            Err(e) => {
                let err = match e {
                    Error::MediaAccessError(_) => e,
                    other => Error::MediaAccessError(other.to_string()),
                };
                return Err(self.fail(err, cx).await);
            }
        };

        if let Err(e) = self.capture.start(sink).await {
            let err = match e {
                Error::MediaAccessError(_) => e,
                other => Error::MediaAccessError(other.to_string()),
            };
            return Err(self.fail(err, cx).await);
        }
        cx.ui.emit(UiEvent::MicEnabled(false));

        let mut session =
            NegotiationSession::new(Arc::clone(&self.engine), self.mode, MessageKind::SessionPublisher);
        if let Err(e) = session.start(OfferOptions::default()).await {
            self.session = Some(session);
            let err = match e {
                Error::NegotiationError(_) => e,
                other => Error::NegotiationError(other.to_string()),
            };
            return Err(self.fail(err, cx).await);
        }
        self.session = Some(session);

        self.set_state(ConnectionState::AwaitingCredentials, cx);
        cx.ui.emit(UiEvent::CredentialsRequired { password: false });

        self.send_description_if_ready(cx).await;
        Ok(())
    }

    async fn handle_message(&mut self, message: ChannelMessage, cx: &mut FlowContext<'_>) -> Result<()> {
        if self.state.is_terminal() {
            debug!("Publisher is {}, ignoring {}", self.state, message.kind());
            return Ok(());
        }

        match message {
            ChannelMessage::PasswordRequired => {
                info!("Backend requires a password");
                self.password_required = true;
                self.awaiting_ack = false;
                cx.ui.emit(UiEvent::CredentialsRequired { password: true });
            }
            ChannelMessage::Info(text) => self.on_info(text, cx),
            ChannelMessage::Error(text) => {
                return Err(self.fail(Error::BackendError(text), cx).await);
            }
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
            other => debug!("Publisher ignoring {}", other.kind()),
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
            Intent::SubmitCredentials { channel, password } => {
                self.submit_credentials(channel, password, cx)
            }
            Intent::SetMicEnabled(enabled) => {
                if !self.authenticated || self.state.is_terminal() {
                    warn!("Microphone stays muted until the publish is accepted");
                    cx.ui.emit(UiEvent::MicEnabled(false));
                    return Ok(());
                }
                self.capture.set_enabled(enabled);
                cx.ui.emit(UiEvent::MicEnabled(enabled));
                Ok(())
            }
            Intent::PickChannel(_) => {
                warn!("Publisher does not pick channels");
                Ok(())
            }
            Intent::Connect | Intent::Reload => Ok(()),
        }
    }

    async fn teardown(&mut self, cx: &mut FlowContext<'_>) {
        info!("Tearing down publisher");
        self.release().await;
        if !self.state.is_terminal() {
            self.set_state(ConnectionState::Closed, cx);
        }
        cx.ui.emit(UiEvent::MicEnabled(false));
        cx.ui.emit(UiEvent::OutputVisible(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ice_notices_are_recognised() {
        assert!(is_ice_notice("ice connected"));
        assert!(is_ice_notice("ICE disconnected"));
        assert!(!is_ice_notice("ice"));
        assert!(!is_ice_notice("publishing into radio"));
        assert!(!is_ice_notice("ok"));
    }
}
