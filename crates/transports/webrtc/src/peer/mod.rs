//! Transport session and negotiation

pub mod engine;
pub mod negotiation;
pub mod rtc;

pub use engine::{EngineEvent, IceConnectionState, MediaKind, OfferOptions, TransportEngine};
pub use negotiation::{NegotiationSession, NegotiationState};
pub use rtc::RtcEngine;
