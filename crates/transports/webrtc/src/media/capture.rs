//! Local audio capture
//!
//! Capture starts muted. Frames produced while muted are discarded, so
//! nothing reaches the outgoing track until the publisher is authorized.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Opus packet encoding 20ms of silence
pub const OPUS_SILENCE_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Duration of one Opus frame
pub const OPUS_FRAME_DURATION: Duration = Duration::from_millis(20);

/// One encoded audio frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Encoded payload
    pub data: Bytes,

    /// Playout duration
    pub duration: Duration,
}

impl AudioFrame {
    /// One 20ms Opus silence frame
    pub fn silence() -> Self {
        Self {
            data: Bytes::from_static(&OPUS_SILENCE_FRAME),
            duration: OPUS_FRAME_DURATION,
        }
    }
}

/// Destination for captured frames (the outgoing audio track)
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Write one encoded frame
    async fn write_frame(&self, frame: AudioFrame) -> Result<()>;
}

/// Local audio source owned by a publisher
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start forwarding frames into `sink`, muted
    ///
    /// Fails with [`Error::MediaAccessError`] when the device is unavailable.
    async fn start(&self, sink: Arc<dyn AudioSink>) -> Result<()>;

    /// Mute or unmute
    fn set_enabled(&self, enabled: bool);

    /// Whether frames currently reach the sink
    fn is_enabled(&self) -> bool;

    /// Release the device; later calls are no-ops
    async fn stop(&self);
}

/// Capture fed by a channel of pre-encoded frames
pub struct SampleCapture {
    source: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
    enabled: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SampleCapture {
    /// Wrap a frame source
    pub fn new(source: mpsc::Receiver<AudioFrame>) -> Self {
        Self {
            source: Mutex::new(Some(source)),
            enabled: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Capture producing Opus silence at the real-time rate
    ///
    /// Used when no input device is wired in; the generator stops once the
    /// capture is stopped.
    pub fn silence() -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(OPUS_FRAME_DURATION);
            loop {
                ticker.tick().await;
                if tx.send(AudioFrame::silence()).await.is_err() {
                    break;
                }
            }
        });
        Self::new(rx)
    }
}

#[async_trait]
impl AudioCapture for SampleCapture {
    async fn start(&self, sink: Arc<dyn AudioSink>) -> Result<()> {
        let Some(mut source) = self.source.lock().await.take() else {
            return Err(Error::MediaAccessError(
                "capture source already in use or released".to_string(),
            ));
        };

        info!("Starting local audio capture (muted)");
        self.enabled.store(false, Ordering::SeqCst);

        let enabled = Arc::clone(&self.enabled);
        let handle = tokio::spawn(async move {
            while let Some(frame) = source.recv().await {
                if !enabled.load(Ordering::SeqCst) {
                    continue;
                }
                if let Err(e) = sink.write_frame(frame).await {
                    warn!("Failed to write audio frame: {}", e);
                }
            }
            debug!("Audio capture source ended");
        });

        *self.task.lock().await = Some(handle);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!("Local audio {}", if enabled { "unmuted" } else { "muted" });
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.source.lock().await.take();
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!("Local audio capture stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectingSink {
        frames: std::sync::Mutex<Vec<AudioFrame>>,
    }

    #[async_trait]
    impl AudioSink for CollectingSink {
        async fn write_frame(&self, frame: AudioFrame) -> Result<()> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    fn frame(byte: u8) -> AudioFrame {
        AudioFrame {
            data: Bytes::from(vec![byte]),
            duration: OPUS_FRAME_DURATION,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_muted_frames_are_discarded() {
        let (tx, rx) = mpsc::channel(8);
        let capture = SampleCapture::new(rx);
        let sink = Arc::new(CollectingSink::default());

        capture.start(sink.clone()).await.unwrap();
        assert!(!capture.is_enabled());

        tx.send(frame(1)).await.unwrap();
        settle().await;
        assert!(sink.frames.lock().unwrap().is_empty());

        capture.set_enabled(true);
        tx.send(frame(2)).await.unwrap();
        settle().await;
        assert_eq!(*sink.frames.lock().unwrap(), vec![frame(2)]);
    }

    #[tokio::test]
    async fn test_second_start_is_media_error() {
        let (_tx, rx) = mpsc::channel(1);
        let capture = SampleCapture::new(rx);
        capture.start(Arc::new(CollectingSink::default())).await.unwrap();

        let err = capture
            .start(Arc::new(CollectingSink::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MediaAccessError(_)));
    }

    #[tokio::test]
    async fn test_stop_mutes_and_releases() {
        let (tx, rx) = mpsc::channel(8);
        let capture = SampleCapture::new(rx);
        let sink = Arc::new(CollectingSink::default());
        capture.start(sink.clone()).await.unwrap();
        capture.set_enabled(true);

        capture.stop().await;
        capture.stop().await;
        assert!(!capture.is_enabled());

        let _ = tx.send(frame(3)).await;
        settle().await;
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_silence_frame() {
        let frame = AudioFrame::silence();
        assert_eq!(&frame.data[..], &OPUS_SILENCE_FRAME);
        assert_eq!(frame.duration, Duration::from_millis(20));
    }
}
