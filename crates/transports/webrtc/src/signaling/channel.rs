//! Persistent duplex message channel to the signaling backend
//!
//! The channel owns the readiness gate for the underlying socket. Anything
//! sent before the socket opens is parked in a single ordered queue and
//! flushed, in submission order, the moment the channel becomes ready:
//!
//! - [`MessageChannel::send`] is best-effort. A message parked while the
//!   channel is still connecting gets one more attempt after the retry delay
//!   and is dropped if the channel is still not ready by then.
//! - [`MessageChannel::send_when_ready`] and [`MessageChannel::on_ready`] are
//!   for session-critical traffic. They wait for readiness without expiring.
//!
//! Inbound frames are decoded and fanned out to every listener subscribed to
//! the message kind. Unknown kinds are dropped without error.

use super::protocol::{ChannelMessage, MessageKind};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outbound half of the physical signaling connection
pub trait SignalingSink: Send {
    /// Write one text frame
    fn transmit(&mut self, frame: String) -> Result<()>;

    /// Ask the transport to close; default is a no-op
    fn close(&mut self) {}
}

/// Callback run once the channel becomes ready
pub type ReadyCallback = Box<dyn FnOnce(&mut MessageChannel) + Send>;

/// Callback run once the channel closes, with the close reason if known
pub type CloseCallback = Box<dyn FnOnce(Option<&str>) + Send>;

/// Readiness of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Socket not open yet
    Connecting,
    /// Socket open, sends go straight out
    Ready,
    /// Terminal; the session is over
    Closed,
}

/// What happened to a send request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the socket
    Sent,
    /// Parked until the channel is ready
    Deferred,
    /// Discarded (channel closed or transport write failed)
    Dropped,
}

enum Deferred {
    /// Best-effort message with its single re-attempt deadline
    Message {
        message: ChannelMessage,
        retry_at: Instant,
    },
    /// Session-critical message
    Critical(ChannelMessage),
    /// Registered ready callback
    Callback(ReadyCallback),
}

impl Deferred {
    fn message(&self) -> Option<&ChannelMessage> {
        match self {
            Deferred::Message { message, .. } | Deferred::Critical(message) => Some(message),
            Deferred::Callback(_) => None,
        }
    }
}

struct Listener {
    kinds: Vec<MessageKind>,
    tx: mpsc::UnboundedSender<ChannelMessage>,
}

/// Message channel with a readiness gate and a deferred send queue
pub struct MessageChannel {
    /// Physical socket writer
    sink: Box<dyn SignalingSink>,

    /// Current readiness
    state: ChannelState,

    /// Delay before the single re-attempt of a best-effort send
    retry_delay: Duration,

    /// Everything waiting for readiness, in submission order
    deferred: VecDeque<Deferred>,

    /// Inbound subscriptions
    listeners: Vec<Listener>,

    /// Handlers invoked on close
    close_handlers: Vec<CloseCallback>,

    /// Frames written to the sink
    sent_count: u64,

    /// Messages discarded
    dropped_count: u64,
}

impl MessageChannel {
    /// Create a channel that is not ready yet
    ///
    /// # Arguments
    ///
    /// * `sink` - Writer for the physical connection
    /// * `retry_delay` - Delay before re-attempting a best-effort send
    pub fn new(sink: Box<dyn SignalingSink>, retry_delay: Duration) -> Self {
        Self {
            sink,
            state: ChannelState::Connecting,
            retry_delay,
            deferred: VecDeque::new(),
            listeners: Vec::new(),
            close_handlers: Vec::new(),
            sent_count: 0,
            dropped_count: 0,
        }
    }

    /// Current readiness
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether sends go straight to the socket
    pub fn is_ready(&self) -> bool {
        self.state == ChannelState::Ready
    }

    /// Whether the channel has closed
    pub fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }

    /// Number of messages and callbacks waiting for readiness
    pub fn pending_len(&self) -> usize {
        self.deferred.len()
    }

    /// Whether a message of `kind` is waiting for readiness
    pub fn has_pending(&self, kind: MessageKind) -> bool {
        self.deferred
            .iter()
            .filter_map(Deferred::message)
            .any(|m| m.kind() == kind)
    }

    /// Frames written so far
    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    /// Messages discarded so far
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Best-effort send
    ///
    /// Ready: written immediately. Connecting: parked and re-attempted once
    /// after the retry delay, then dropped. Closed: dropped and logged.
    pub fn send(&mut self, message: ChannelMessage, now: Instant) -> SendOutcome {
        match self.state {
            ChannelState::Ready => self.transmit(&message),
            ChannelState::Connecting => {
                debug!(
                    "Signaling channel not ready, delaying {} message",
                    message.kind()
                );
                self.deferred.push_back(Deferred::Message {
                    message,
                    retry_at: now + self.retry_delay,
                });
                SendOutcome::Deferred
            }
            ChannelState::Closed => self.drop_after_close(&message),
        }
    }

    /// Session-critical send that waits for readiness without expiring
    pub fn send_when_ready(&mut self, message: ChannelMessage) -> SendOutcome {
        match self.state {
            ChannelState::Ready => self.transmit(&message),
            ChannelState::Connecting => {
                debug!("Queueing {} message until channel is ready", message.kind());
                self.deferred.push_back(Deferred::Critical(message));
                SendOutcome::Deferred
            }
            ChannelState::Closed => self.drop_after_close(&message),
        }
    }

    /// Register a callback for the ready transition
    ///
    /// Runs synchronously if the channel is already ready; never runs if the
    /// channel closes first.
    pub fn on_ready<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut MessageChannel) + Send + 'static,
    {
        match self.state {
            ChannelState::Ready => callback(self),
            ChannelState::Connecting => self.deferred.push_back(Deferred::Callback(Box::new(callback))),
            ChannelState::Closed => warn!("Ready callback registered on a closed signaling channel"),
        }
    }

    /// Register a handler for the close transition
    pub fn on_close<F>(&mut self, handler: F)
    where
        F: FnOnce(Option<&str>) + Send + 'static,
    {
        if self.state == ChannelState::Closed {
            handler(None);
        } else {
            self.close_handlers.push(Box::new(handler));
        }
    }

    /// Subscribe to inbound messages of the given kinds
    ///
    /// Every subscriber gets its own copy; subscribers never displace each
    /// other. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self, kinds: &[MessageKind]) -> mpsc::UnboundedReceiver<ChannelMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(Listener {
            kinds: kinds.to_vec(),
            tx,
        });
        rx
    }

    /// Socket opened: flush everything parked, in submission order
    ///
    /// Only the first call per channel has any effect.
    pub fn mark_ready(&mut self) {
        if self.state != ChannelState::Connecting {
            debug!("Ignoring ready signal in state {:?}", self.state);
            return;
        }

        self.state = ChannelState::Ready;
        info!(
            "Signaling channel ready, flushing {} deferred entries",
            self.deferred.len()
        );

        let queue = std::mem::take(&mut self.deferred);
        for entry in queue {
            match entry {
                Deferred::Message { message, .. } | Deferred::Critical(message) => {
                    self.transmit(&message);
                }
                Deferred::Callback(callback) => callback(self),
            }
        }
    }

    /// Run the single re-attempt for best-effort sends whose delay elapsed
    ///
    /// Returns the number of messages dropped because the channel was still
    /// not ready.
    pub fn expire_retries(&mut self, now: Instant) -> usize {
        let mut dropped = 0;
        let mut kept = VecDeque::with_capacity(self.deferred.len());

        for entry in std::mem::take(&mut self.deferred) {
            match entry {
                Deferred::Message { message, retry_at } if retry_at <= now => {
                    if self.state == ChannelState::Ready {
                        self.transmit(&message);
                    } else {
                        let err = Error::ChannelUnavailable(format!(
                            "{} message not sent, channel still not open",
                            message.kind()
                        ));
                        warn!("{}", err);
                        self.dropped_count += 1;
                        dropped += 1;
                    }
                }
                other => kept.push_back(other),
            }
        }

        self.deferred = kept;
        dropped
    }

    /// Earliest pending retry deadline
    pub fn next_retry_deadline(&self) -> Option<Instant> {
        self.deferred
            .iter()
            .filter_map(|d| match d {
                Deferred::Message { retry_at, .. } => Some(*retry_at),
                _ => None,
            })
            .min()
    }

    /// Decode an inbound frame and dispatch it to subscribers
    ///
    /// Returns the kind of the dispatched message, or `None` when the kind
    /// is not one this client knows.
    pub fn receive(&mut self, frame: &str) -> Result<Option<MessageKind>> {
        let Some(message) = ChannelMessage::decode(frame)? else {
            debug!("Ignoring unknown signaling message: {}", frame);
            return Ok(None);
        };

        let kind = message.kind();
        match &message {
            ChannelMessage::Malformed { reason, .. } => warn!("Malformed {} message: {}", kind, reason),
            _ => debug!("Received {} message", kind),
        }

        self.listeners.retain(|l| !l.tx.is_closed());
        for listener in self.listeners.iter().filter(|l| l.kinds.contains(&kind)) {
            let _ = listener.tx.send(message.clone());
        }

        Ok(Some(kind))
    }

    /// Enter the terminal state and notify close handlers
    ///
    /// Anything still parked is discarded. Repeated calls are no-ops.
    pub fn close(&mut self, reason: Option<&str>) {
        if self.state == ChannelState::Closed {
            return;
        }

        info!(
            "Signaling channel closed{}",
            reason.map(|r| format!(": {}", r)).unwrap_or_default()
        );
        self.state = ChannelState::Closed;

        let discarded = self.deferred.len();
        if discarded > 0 {
            warn!("Discarding {} deferred entries on close", discarded);
            self.dropped_count += self.deferred.iter().filter(|d| d.message().is_some()).count() as u64;
            self.deferred.clear();
        }

        self.sink.close();

        for handler in std::mem::take(&mut self.close_handlers) {
            handler(reason);
        }
    }

    fn transmit(&mut self, message: &ChannelMessage) -> SendOutcome {
        if self.state == ChannelState::Closed {
            return self.drop_after_close(message);
        }

        let frame = match message.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode {} message: {}", message.kind(), e);
                self.dropped_count += 1;
                return SendOutcome::Dropped;
            }
        };

        debug!("Sending signaling message: {}", frame);
        match self.sink.transmit(frame) {
            Ok(()) => {
                self.sent_count += 1;
                SendOutcome::Sent
            }
            Err(e) => {
                warn!("Failed to send {} message: {}", message.kind(), e);
                self.dropped_count += 1;
                SendOutcome::Dropped
            }
        }
    }

    fn drop_after_close(&mut self, message: &ChannelMessage) -> SendOutcome {
        warn!(
            "Signaling channel closed, dropping {} message",
            message.kind()
        );
        self.dropped_count += 1;
        SendOutcome::Dropped
    }
}
