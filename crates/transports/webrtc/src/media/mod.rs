//! Local media handling

pub mod capture;

pub use capture::{AudioCapture, AudioFrame, AudioSink, SampleCapture};
