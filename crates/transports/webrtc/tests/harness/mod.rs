//! Babelcast client test harness
//!
//! Provides scripted stand-ins for every collaborator of the client:
//! - `MockEngine`: transport engine that records calls; tests inject its
//!   events through the sender returned by `Rig::engine_events`
//! - `RecordingSink`: signaling sink keeping every frame written
//! - `RecordingUi`: UI bridge keeping every presentation update
//! - `MockCapture`: audio capture tracking mute and stop
//!
//! `Rig` wires them into a running `SignalingClient`.

#![allow(dead_code)]

use async_trait::async_trait;
use babelcast_webrtc::peer::engine::{IceCandidate, SessionDescription};
use babelcast_webrtc::signaling::{SignalingSink, SocketEvent};
use babelcast_webrtc::{
    AudioCapture, AudioFrame, AudioSink, ChannelMessage, ClientConfig, ClientExit, ConnectionState,
    EngineEvent, Error, Intent, MessageKind, OfferOptions, PublisherFlow, Result, RoleFlow, SignalingClient,
    SubscriberFlow, TransportEngine, UiBridge, UiEvent,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Offer SDP produced by the mock engine
pub const OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";

/// Initialize test logging (safe to call from every test)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,babelcast_webrtc=debug")
        .with_test_writer()
        .try_init();
}

/// Answer SDP accepted by the mock engine
pub const ANSWER_SDP: &str = "v=0\r\no=- 2 1 IN IP4 0.0.0.0\r\ns=-\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";

/// A host candidate with a distinct address per index
pub fn host_candidate(n: u8) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{} 1 udp 2122260223 192.168.1.{} 5000{} typ host", n, n, n),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

/// Encode an inbound frame the way the backend does
pub fn frame(key: &str, value: serde_json::Value) -> String {
    if value.is_null() {
        serde_json::json!({ "Key": key }).to_string()
    } else {
        serde_json::json!({ "Key": key, "Value": value }).to_string()
    }
}

// ============================================================================
// Transport engine
// ============================================================================

/// Scripted transport engine
#[derive(Default)]
pub struct MockEngine {
    /// Fail `add_audio_track` as a denied microphone would
    pub deny_media: AtomicBool,
    /// Options passed to `create_offer`
    pub offers: Mutex<Vec<OfferOptions>>,
    /// Local candidates embedded in `local_description`
    pub gathered: Mutex<Vec<IceCandidate>>,
    /// Remote descriptions applied
    pub remote_descriptions: Mutex<Vec<SessionDescription>>,
    /// Remote candidates applied
    pub remote_candidates: Mutex<Vec<IceCandidate>>,
    /// Whether a local description is set
    pub local_set: AtomicBool,
    /// Number of close calls
    pub closes: AtomicUsize,
    /// Whether an outgoing audio track exists
    pub audio_track: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a gathered candidate so it shows up in the local description
    pub fn gather(&self, candidate: IceCandidate) {
        self.gathered.lock().unwrap().push(candidate);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn remote_candidate_count(&self) -> usize {
        self.remote_candidates.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportEngine for MockEngine {
    async fn add_audio_track(&self) -> Result<Arc<dyn AudioSink>> {
        if self.deny_media.load(Ordering::SeqCst) {
            return Err(Error::MediaAccessError("Permission denied".to_string()));
        }
        self.audio_track.store(true, Ordering::SeqCst);
        Ok(Arc::new(NullSink))
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription> {
        self.offers.lock().unwrap().push(options);
        Ok(SessionDescription::offer(OFFER_SDP))
    }

    async fn set_local_description(&self, _description: &SessionDescription) -> Result<()> {
        self.local_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        if !self.local_set.load(Ordering::SeqCst) {
            return None;
        }
        let mut sdp = OFFER_SDP.to_string();
        for candidate in self.gathered.lock().unwrap().iter() {
            sdp.push_str(&format!("a={}\r\n", candidate.candidate));
        }
        Some(SessionDescription::offer(sdp))
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        if !description.sdp.starts_with("v=0") {
            return Err(Error::DescriptionError("malformed SDP".to_string()));
        }
        self.remote_descriptions.lock().unwrap().push(description.clone());
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.remote_candidates.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn write_frame(&self, _frame: AudioFrame) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Signaling sink
// ============================================================================

/// Sink recording every frame written to the socket
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// Frames decoded back into messages
    pub fn messages(&self) -> Vec<ChannelMessage> {
        self.frames()
            .iter()
            .filter_map(|f| ChannelMessage::from_json(f).ok().flatten())
            .collect()
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.messages().iter().map(ChannelMessage::kind).collect()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.kinds().iter().filter(|k| **k == kind).count()
    }
}

impl SignalingSink for RecordingSink {
    fn transmit(&mut self, frame: String) -> Result<()> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

// ============================================================================
// UI bridge
// ============================================================================

/// UI bridge recording every update
#[derive(Clone, Default)]
pub struct RecordingUi {
    events: Arc<Mutex<Vec<UiEvent>>>,
}

impl RecordingUi {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &UiEvent) -> bool {
        self.events.lock().unwrap().contains(event)
    }

    /// Last visibility reported for the channel picker
    pub fn channel_pick_visible(&self) -> Option<bool> {
        self.events().iter().rev().find_map(|e| match e {
            UiEvent::ChannelPickVisible(v) => Some(*v),
            _ => None,
        })
    }

    /// Last mute state reported
    pub fn mic_enabled(&self) -> Option<bool> {
        self.events().iter().rev().find_map(|e| match e {
            UiEvent::MicEnabled(v) => Some(*v),
            _ => None,
        })
    }

    /// Last connection state reported
    pub fn state(&self) -> Option<ConnectionState> {
        self.events().iter().rev().find_map(|e| match e {
            UiEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
    }

    /// Every connection state reported, in order
    pub fn states(&self) -> Vec<ConnectionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::StateChanged(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl UiBridge for RecordingUi {
    fn emit(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// Audio capture
// ============================================================================

/// Capture tracking mute and stop
#[derive(Default)]
pub struct MockCapture {
    pub started: AtomicBool,
    pub enabled: AtomicBool,
    pub stopped: AtomicBool,
}

impl MockCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl AudioCapture for MockCapture {
    async fn start(&self, _sink: Arc<dyn AudioSink>) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Running client
// ============================================================================

/// A `SignalingClient` running on its own task with every input scripted
pub struct Rig {
    pub sink: RecordingSink,
    pub ui: RecordingUi,
    pub engine: Arc<MockEngine>,
    pub capture: Arc<MockCapture>,
    socket: mpsc::UnboundedSender<SocketEvent>,
    intents: mpsc::UnboundedSender<Intent>,
    engine_events: mpsc::UnboundedSender<EngineEvent>,
    handle: JoinHandle<Result<ClientExit>>,
}

impl Rig {
    /// Start a subscriber client
    pub fn subscriber(config: ClientConfig) -> Self {
        Self::start(config, |engine, _capture, config| {
            Box::new(SubscriberFlow::new(engine, config))
        })
    }

    /// Start a publisher client
    pub fn publisher(config: ClientConfig) -> Self {
        Self::publisher_with(config, MockEngine::new())
    }

    /// Start a publisher client over a prepared engine
    pub fn publisher_with(config: ClientConfig, engine: Arc<MockEngine>) -> Self {
        Self::start_with(config, engine, |engine, capture, config| {
            Box::new(PublisherFlow::new(engine, capture, config.gathering_mode))
        })
    }

    fn start<F>(config: ClientConfig, make_flow: F) -> Self
    where
        F: FnOnce(Arc<dyn TransportEngine>, Arc<dyn AudioCapture>, &ClientConfig) -> Box<dyn RoleFlow>,
    {
        Self::start_with(config, MockEngine::new(), make_flow)
    }

    fn start_with<F>(config: ClientConfig, engine: Arc<MockEngine>, make_flow: F) -> Self
    where
        F: FnOnce(Arc<dyn TransportEngine>, Arc<dyn AudioCapture>, &ClientConfig) -> Box<dyn RoleFlow>,
    {
        let sink = RecordingSink::default();
        let ui = RecordingUi::default();
        let capture = MockCapture::new();

        let engine_handle: Arc<dyn TransportEngine> = engine.clone();
        let capture_handle: Arc<dyn AudioCapture> = capture.clone();
        let flow = make_flow(engine_handle, capture_handle, &config);
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let client = SignalingClient::new(
            &config,
            Box::new(sink.clone()),
            flow,
            engine_rx,
            Arc::new(ui.clone()),
        );

        let (socket_tx, socket_rx) = mpsc::unbounded_channel();
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(client.run(socket_rx, intent_rx));

        Self {
            sink,
            ui,
            engine,
            capture,
            socket: socket_tx,
            intents: intent_tx,
            engine_events: engine_tx,
            handle,
        }
    }

    /// Let the client task process everything queued
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    pub async fn open(&self) {
        self.socket.send(SocketEvent::Opened).unwrap();
        self.settle().await;
    }

    pub async fn receive(&self, key: &str, value: serde_json::Value) {
        self.socket.send(SocketEvent::Frame(frame(key, value))).unwrap();
        self.settle().await;
    }

    pub async fn intent(&self, intent: Intent) {
        self.intents.send(intent).unwrap();
        self.settle().await;
    }

    pub async fn engine_event(&self, event: EngineEvent) {
        self.engine_events.send(event).unwrap();
        self.settle().await;
    }

    /// Report a gathered candidate the way the engine would
    pub async fn discover(&self, candidate: IceCandidate) {
        self.engine.gather(candidate.clone());
        self.engine_event(EngineEvent::CandidateFound(candidate)).await;
    }

    /// Close the socket and wait for the client to exit
    pub async fn close(self, reason: Option<&str>) -> Result<ClientExit> {
        self.socket
            .send(SocketEvent::Closed(reason.map(str::to_string)))
            .unwrap();
        self.handle.await.expect("client task panicked")
    }

    /// Ask for a reload and wait for the client to exit
    pub async fn reload(self) -> Result<ClientExit> {
        self.intents.send(Intent::Reload).unwrap();
        self.handle.await.expect("client task panicked")
    }
}
