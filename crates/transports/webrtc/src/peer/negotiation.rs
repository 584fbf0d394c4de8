//! Offer/answer negotiation state machine
//!
//! ```text
//! Idle -> OfferCreated -> DescriptionSet -> Gathering -> ReadyToSend
//!      -> AwaitingAnswer -> Connected
//! ```
//!
//! `Failed` is reachable from every state. In incremental mode the session
//! is ready to send as soon as discovery starts and candidates follow the
//! description one message each. In batched mode nothing is sent until
//! discovery completes, and then the description goes out once with every
//! candidate embedded.
//!
//! Remote candidates that arrive before the remote description are buffered
//! and applied right after the answer.

use super::engine::{EngineEvent, IceCandidate, OfferOptions, SessionDescription, TransportEngine};
use crate::config::GatheringMode;
use crate::signaling::{ChannelMessage, MessageChannel, MessageKind};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Nothing requested yet
    Idle,
    /// Local offer exists
    OfferCreated,
    /// Offer applied as the local description
    DescriptionSet,
    /// Candidate discovery running
    Gathering,
    /// Description can be sent
    ReadyToSend,
    /// Description sent, waiting for the answer
    AwaitingAnswer,
    /// Answer applied
    Connected,
    /// Terminal failure
    Failed,
    /// Closed by its owner
    Closed,
}

impl NegotiationState {
    /// Whether the session is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Failed | NegotiationState::Closed)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::OfferCreated => "offer_created",
            NegotiationState::DescriptionSet => "description_set",
            NegotiationState::Gathering => "gathering",
            NegotiationState::ReadyToSend => "ready_to_send",
            NegotiationState::AwaitingAnswer => "awaiting_answer",
            NegotiationState::Connected => "connected",
            NegotiationState::Failed => "failed",
            NegotiationState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// One negotiation attempt over one transport session
pub struct NegotiationSession {
    /// Attempt identifier for logs
    id: String,

    /// Transport session, exclusively owned by this attempt
    engine: Arc<dyn TransportEngine>,

    /// Candidate delivery strategy
    mode: GatheringMode,

    /// Kind used when sending the local description
    session_kind: MessageKind,

    /// Current state
    state: NegotiationState,

    /// Applied local description
    local_description: Option<SessionDescription>,

    /// Applied remote description
    remote_description: Option<SessionDescription>,

    /// Candidates collected in batched mode
    candidates: Vec<IceCandidate>,

    /// Incremental-mode candidates found before the description went out
    held_candidates: Vec<IceCandidate>,

    /// Remote candidates received before the remote description
    pending_remote: Vec<IceCandidate>,

    /// Discovery finished
    gathering_complete: bool,

    /// Local description has been handed out
    description_sent: bool,

    /// `ice_candidate` messages sent
    candidates_sent: usize,

    /// Engine already closed
    engine_closed: bool,
}

impl NegotiationSession {
    /// Create an idle session
    ///
    /// # Arguments
    ///
    /// * `engine` - Transport session to drive
    /// * `mode` - Candidate gathering mode
    /// * `session_kind` - `session`, `session_publisher` or `session_subscriber`
    pub fn new(engine: Arc<dyn TransportEngine>, mode: GatheringMode, session_kind: MessageKind) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        debug!("New negotiation session {} ({:?}, {})", id, mode, session_kind);

        Self {
            id,
            engine,
            mode,
            session_kind,
            state: NegotiationState::Idle,
            local_description: None,
            remote_description: None,
            candidates: Vec::new(),
            held_candidates: Vec::new(),
            pending_remote: Vec::new(),
            gathering_complete: false,
            description_sent: false,
            candidates_sent: 0,
            engine_closed: false,
        }
    }

    /// Attempt identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Gathering mode
    pub fn mode(&self) -> GatheringMode {
        self.mode
    }

    /// Applied local description
    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    /// Applied remote description
    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    /// Candidates collected so far in batched mode
    pub fn collected_candidates(&self) -> &[IceCandidate] {
        &self.candidates
    }

    /// Remote candidates waiting for the remote description
    pub fn pending_remote_candidates(&self) -> usize {
        self.pending_remote.len()
    }

    /// Number of `ice_candidate` messages sent
    pub fn candidates_sent(&self) -> usize {
        self.candidates_sent
    }

    /// Whether discovery has finished
    pub fn is_gathering_complete(&self) -> bool {
        self.gathering_complete
    }

    /// Whether the description can be sent now
    pub fn is_ready_to_send(&self) -> bool {
        self.state == NegotiationState::ReadyToSend
    }

    fn transition(&mut self, next: NegotiationState) {
        if self.state != next {
            debug!("Negotiation {}: {} -> {}", self.id, self.state, next);
            self.state = next;
        }
    }

    /// Create the offer, apply it locally, and begin discovery
    pub async fn start(&mut self, options: OfferOptions) -> Result<()> {
        if self.state != NegotiationState::Idle {
            return Err(Error::InvalidState(format!(
                "negotiation already started (state {})",
                self.state
            )));
        }

        let offer = match self.engine.create_offer(options).await {
            Ok(offer) => offer,
            Err(e) => {
                self.transition(NegotiationState::Failed);
                return Err(e);
            }
        };
        self.transition(NegotiationState::OfferCreated);

        if let Err(e) = self.engine.set_local_description(&offer).await {
            self.transition(NegotiationState::Failed);
            return Err(e);
        }
        self.local_description = Some(offer);
        self.transition(NegotiationState::DescriptionSet);

        self.transition(NegotiationState::Gathering);
        if self.mode == GatheringMode::Incremental {
            self.transition(NegotiationState::ReadyToSend);
        }

        info!("Negotiation {} started ({:?} gathering)", self.id, self.mode);
        Ok(())
    }

    /// Feed a discovery event from the engine
    ///
    /// Track and connection-state events are ignored here; see
    /// [`Self::on_transport_state`].
    pub async fn on_engine_event(&mut self, event: &EngineEvent, channel: &mut MessageChannel) {
        match event {
            EngineEvent::CandidateFound(candidate) => self.on_candidate(candidate.clone(), channel),
            EngineEvent::GatheringComplete => self.on_gathering_complete().await,
            EngineEvent::ConnectionStateChanged(_) | EngineEvent::TrackAdded { .. } => {}
        }
    }

    fn on_candidate(&mut self, candidate: IceCandidate, channel: &mut MessageChannel) {
        if self.state.is_terminal() {
            debug!("Negotiation {} over, ignoring local candidate", self.id);
            return;
        }
        if candidate.is_empty() {
            debug!("Skipping empty local candidate");
            return;
        }

        match self.mode {
            GatheringMode::Batched => self.candidates.push(candidate),
            GatheringMode::Incremental if self.description_sent => {
                self.send_candidate(candidate, channel);
            }
            GatheringMode::Incremental => self.held_candidates.push(candidate),
        }
    }

    async fn on_gathering_complete(&mut self) {
        if self.gathering_complete {
            return;
        }
        self.gathering_complete = true;
        debug!("Negotiation {}: candidate discovery complete", self.id);

        if self.mode == GatheringMode::Batched && self.state == NegotiationState::Gathering {
            // The engine's description now embeds every candidate
            if let Some(description) = self.engine.local_description().await {
                self.local_description = Some(description);
            }
            self.transition(NegotiationState::ReadyToSend);
        }
    }

    fn send_candidate(&mut self, candidate: IceCandidate, channel: &mut MessageChannel) {
        channel.send_when_ready(ChannelMessage::IceCandidate(candidate));
        self.candidates_sent += 1;
    }

    /// Hand out the local description for sending
    ///
    /// Returns `None` unless the session is ready to send. Moves the session
    /// to `AwaitingAnswer`; the caller must put the description on the wire.
    /// Candidates held back in incremental mode are released by
    /// [`Self::flush_held_candidates`].
    pub async fn take_ready_description(&mut self) -> Option<SessionDescription> {
        if self.state != NegotiationState::ReadyToSend {
            return None;
        }

        let description = match self.mode {
            GatheringMode::Batched => self.local_description.clone(),
            GatheringMode::Incremental => match self.engine.local_description().await {
                Some(current) => Some(current),
                None => self.local_description.clone(),
            },
        }?;

        self.description_sent = true;
        self.transition(NegotiationState::AwaitingAnswer);
        Some(description)
    }

    /// Send the local description as this session's `session*` message
    ///
    /// Returns whether a description was sent.
    pub async fn send_description(&mut self, channel: &mut MessageChannel) -> bool {
        let Some(description) = self.take_ready_description().await else {
            return false;
        };

        info!(
            "Sending {} ({} embedded candidates)",
            self.session_kind,
            description.candidate_count()
        );
        channel.send_when_ready(ChannelMessage::session(self.session_kind, description));
        self.flush_held_candidates(channel);
        true
    }

    /// Send incremental candidates found before the description went out
    pub fn flush_held_candidates(&mut self, channel: &mut MessageChannel) {
        if !self.description_sent || self.state.is_terminal() {
            return;
        }
        for candidate in std::mem::take(&mut self.held_candidates) {
            self.send_candidate(candidate, channel);
        }
    }

    /// Apply the remote answer
    ///
    /// An empty or malformed description fails the session with
    /// [`Error::DescriptionError`]; it is not retried.
    pub async fn apply_answer(&mut self, answer: &SessionDescription) -> Result<()> {
        if self.state.is_terminal() {
            warn!("Negotiation {} is {}, ignoring answer", self.id, self.state);
            return Ok(());
        }
        if self.state != NegotiationState::AwaitingAnswer {
            warn!("Answer received in state {}", self.state);
        }

        if answer.sdp.trim().is_empty() {
            self.transition(NegotiationState::Failed);
            return Err(Error::DescriptionError("remote description is empty".to_string()));
        }

        if let Err(e) = self.engine.set_remote_description(answer).await {
            self.transition(NegotiationState::Failed);
            return Err(match e {
                Error::DescriptionError(_) => e,
                other => Error::DescriptionError(other.to_string()),
            });
        }

        self.remote_description = Some(answer.clone());
        self.transition(NegotiationState::Connected);
        info!("Negotiation {} connected", self.id);

        for candidate in std::mem::take(&mut self.pending_remote) {
            if let Err(e) = self.engine.add_ice_candidate(&candidate).await {
                warn!("Failed to apply buffered remote candidate: {}", e);
            }
        }

        Ok(())
    }

    /// Fail the session on an answer whose payload could not be decoded
    pub fn reject_answer(&mut self, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        if !self.state.is_terminal() {
            warn!("Negotiation {} received an unreadable answer: {}", self.id, reason);
            self.transition(NegotiationState::Failed);
        }
        Error::DescriptionError(reason)
    }

    /// Apply a remote candidate, or buffer it until the remote description exists
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if self.state.is_terminal() {
            debug!("Negotiation {} over, ignoring remote candidate", self.id);
            return Ok(());
        }
        if candidate.is_empty() {
            debug!("Ignoring empty remote candidate");
            return Ok(());
        }

        if self.remote_description.is_none() {
            debug!("Buffering remote candidate until the answer arrives");
            self.pending_remote.push(candidate);
            return Ok(());
        }

        self.engine.add_ice_candidate(&candidate).await
    }

    /// React to a transport connection-state change
    ///
    /// Returns `true` if the change failed the session.
    pub fn on_transport_state(&mut self, state: super::engine::IceConnectionState) -> bool {
        if state.is_terminal_failure() && !self.state.is_terminal() {
            warn!("Negotiation {} failed: transport {}", self.id, state);
            self.transition(NegotiationState::Failed);
            return true;
        }
        false
    }

    /// Mark the session failed without closing the engine
    pub fn fail(&mut self) {
        self.transition(NegotiationState::Failed);
    }

    /// Close the transport session
    ///
    /// A failed session stays `Failed`; anything else becomes `Closed`.
    /// Repeated calls are no-ops.
    pub async fn close(&mut self) {
        if self.state != NegotiationState::Failed {
            self.transition(NegotiationState::Closed);
        }
        self.held_candidates.clear();
        self.pending_remote.clear();

        if self.engine_closed {
            return;
        }
        self.engine_closed = true;
        if let Err(e) = self.engine.close().await {
            warn!("Failed to close transport session: {}", e);
        }
    }
}
