//! Babelcast audio client
//!
//! This crate drives the signaling and negotiation side of a Babelcast audio
//! session: publishing a local audio source into a named channel, or
//! subscribing to a channel to receive its audio.
//!
//! # Features
//!
//! - **Message channel**: readiness-gated sends over a WebSocket, flushed in
//!   submission order once the socket opens
//! - **Negotiation**: offer/answer state machine with incremental (trickle)
//!   or batched candidate gathering
//! - **Channel directory**: interval polling that stops at the first
//!   non-empty listing
//! - **Role flows**: publisher with a credential gate and muted-by-default
//!   capture, subscriber with directory lookup and channel pick
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │  UI (UiBridge / Intent)                               │
//! │  ↓                                                    │
//! │  SignalingClient (single-task event loop)             │
//! │  ├─ MessageChannel ── WebSocket ── signaling backend │
//! │  └─ RoleFlow (PublisherFlow / SubscriberFlow)         │
//! │     ├─ NegotiationSession ── TransportEngine (webrtc) │
//! │     ├─ ChannelDirectory (subscriber)                  │
//! │     └─ AudioCapture (publisher)                       │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use babelcast_webrtc::{ClientConfig, GatheringMode};
//!
//! let config = ClientConfig::batched("wss://cast.example/ws");
//! assert_eq!(config.gathering_mode, GatheringMode::Batched);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use babelcast_webrtc::{
//!     ClientConfig, Intent, RtcEngine, SignalingClient, SubscriberFlow, TracingUiBridge,
//! };
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> babelcast_webrtc::Result<()> {
//! let config = ClientConfig::trickle("ws://localhost:8080/ws");
//! let (engine_tx, engine_rx) = mpsc::unbounded_channel();
//! let engine = Arc::new(RtcEngine::new(&config, engine_tx).await?);
//! let flow = Box::new(SubscriberFlow::new(engine, &config));
//!
//! let (client, socket) =
//!     SignalingClient::connect(&config, flow, engine_rx, Arc::new(TracingUiBridge))?;
//! let (intents, intent_rx) = mpsc::unbounded_channel();
//! intents.send(Intent::Connect).ok();
//! client.run(socket, intent_rx).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod media;
pub mod peer;
pub mod role;
pub mod signaling;
pub mod ui;

// Re-exports for public API
pub use client::{ClientExit, SignalingClient};
pub use config::{ClientConfig, GatheringMode};
pub use directory::{ChannelDirectory, DirectoryUpdate};
pub use error::{Error, Result};
pub use media::{AudioCapture, AudioFrame, AudioSink, SampleCapture};
pub use peer::{
    EngineEvent, IceConnectionState, MediaKind, NegotiationSession, NegotiationState, OfferOptions,
    RtcEngine, TransportEngine,
};
pub use role::{ConnectionState, PublisherFlow, Role, RoleFlow, SubscriberFlow};
pub use signaling::{ChannelMessage, MessageChannel, MessageKind};
pub use ui::{ChannelUiBridge, Intent, TracingUiBridge, UiBridge, UiEvent};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
    }
}
