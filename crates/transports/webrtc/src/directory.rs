//! Channel directory polling for subscribers
//!
//! While polling, a `get_channels` request goes out every interval. The
//! first non-empty `channels` response stops the poll for good; only an
//! explicit [`ChannelDirectory::start`] begins a new one.
//!
//! Requests are best-effort: one parked before the socket opens expires
//! after the channel's retry delay and the next due poll issues another.

use crate::signaling::{ChannelMessage, MessageChannel, MessageKind};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Result of applying a `channels` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryUpdate {
    /// Channels exist; polling has stopped
    Available(Vec<String>),
    /// Nothing to pick yet
    Empty,
}

/// Subscriber-side channel directory
#[derive(Debug)]
pub struct ChannelDirectory {
    interval: Duration,
    entries: Vec<String>,
    /// Next poll time; `Some` exactly while polling
    next_poll: Option<Instant>,
    requests: u64,
}

impl ChannelDirectory {
    /// Create a stopped directory
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            entries: Vec::new(),
            next_poll: None,
            requests: 0,
        }
    }

    /// Whether the poll is running
    pub fn is_polling(&self) -> bool {
        self.next_poll.is_some()
    }

    /// Last known channel names, in backend order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of `get_channels` requests issued
    pub fn requests_sent(&self) -> u64 {
        self.requests
    }

    /// When the next request is due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_poll
    }

    /// Begin polling with an immediate request
    ///
    /// Returns `false` (and does nothing) if already polling.
    pub fn start(&mut self, now: Instant, channel: &mut MessageChannel) -> bool {
        if self.is_polling() {
            debug!("Directory already polling");
            return false;
        }

        info!("Polling channel directory every {:?}", self.interval);
        self.request(now, channel);
        true
    }

    /// Issue the next request if it is due
    pub fn poll_due(&mut self, now: Instant, channel: &mut MessageChannel) {
        match self.next_poll {
            Some(at) if at <= now => self.request(now, channel),
            _ => {}
        }
    }

    fn request(&mut self, now: Instant, channel: &mut MessageChannel) {
        // Before the socket opens one queued request is enough
        if !channel.has_pending(MessageKind::GetChannels) {
            channel.send(ChannelMessage::GetChannels, now);
            self.requests += 1;
        }
        self.next_poll = Some(now + self.interval);
    }

    /// Apply a `channels` response
    pub fn on_channels(&mut self, channels: Vec<String>) -> DirectoryUpdate {
        let mut entries: Vec<String> = Vec::with_capacity(channels.len());
        for name in channels {
            if !name.is_empty() && !entries.contains(&name) {
                entries.push(name);
            }
        }
        self.entries = entries;

        if self.entries.is_empty() {
            debug!("Channel directory is empty");
            return DirectoryUpdate::Empty;
        }

        self.stop();
        info!("Channels available: {:?}", self.entries);
        DirectoryUpdate::Available(self.entries.clone())
    }

    /// Cancel the poll; returns whether a poll was running
    pub fn stop(&mut self) -> bool {
        let was_polling = self.next_poll.take().is_some();
        if was_polling {
            debug!("Directory poll stopped");
        }
        was_polling
    }
}
