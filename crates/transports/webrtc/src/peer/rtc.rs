//! `webrtc` crate implementation of [`TransportEngine`]

use super::engine::{
    EngineEvent, IceCandidate, IceConnectionState, MediaKind, OfferOptions, SdpType,
    SessionDescription, TransportEngine,
};
use crate::config::ClientConfig;
use crate::media::{AudioFrame, AudioSink};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Transport engine backed by an `RTCPeerConnection`
pub struct RtcEngine {
    /// Identifier used in track and stream ids
    connection_id: String,

    /// Underlying peer connection
    peer_connection: Arc<RTCPeerConnection>,

    /// Audio RTP sender (retained to prevent track cleanup)
    audio_sender: RwLock<Option<Arc<RTCRtpSender>>>,
}

impl RtcEngine {
    /// Create a peer connection and wire its callbacks to `events`
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration (STUN servers)
    /// * `events` - Receives discovery, track, and connection-state events
    #[instrument(skip_all)]
    pub async fn new(config: &ClientConfig, events: mpsc::UnboundedSender<EngineEvent>) -> Result<Self> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        info!("Creating transport engine: connection_id={}", connection_id);

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: config.stun_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let peer_connection =
            Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
                Error::WebRtcError(format!("Failed to create peer connection: {}", e))
            })?);

        let candidate_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = candidate_tx.clone();
            Box::pin(async move {
                let event = match candidate {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => EngineEvent::CandidateFound(from_candidate_init(init)),
                        Err(e) => {
                            warn!("Failed to serialize local candidate: {}", e);
                            return;
                        }
                    },
                    None => EngineEvent::GatheringComplete,
                };
                let _ = tx.send(event);
            })
        }));

        let state_tx = events.clone();
        peer_connection.on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
            let tx = state_tx.clone();
            Box::pin(async move {
                if let Some(state) = map_connection_state(s) {
                    debug!("ICE connection state: {}", state);
                    let _ = tx.send(EngineEvent::ConnectionStateChanged(state));
                }
            })
        }));

        let track_tx = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Video => MediaKind::Video,
                        _ => MediaKind::Audio,
                    };
                    let id = track.id();
                    info!("Remote {} track added: {}", kind, id);
                    let _ = tx.send(EngineEvent::TrackAdded { kind, id });
                })
            },
        ));

        Ok(Self {
            connection_id,
            peer_connection,
            audio_sender: RwLock::new(None),
        })
    }

    /// Get the connection ID
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }
}

#[async_trait]
impl TransportEngine for RtcEngine {
    async fn add_audio_track(&self) -> Result<Arc<dyn AudioSink>> {
        info!("Adding local audio track");

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            format!("audio-{}", self.connection_id),
            format!("stream-{}", self.connection_id),
        ));

        let sender = self
            .peer_connection
            .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaAccessError(format!("Failed to add audio track: {}", e)))?;

        *self.audio_sender.write().await = Some(sender);

        Ok(Arc::new(RtcAudioTrack { track }))
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription> {
        if options.receive_audio {
            self.peer_connection
                .add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| {
                    Error::NegotiationError(format!("Failed to add audio transceiver: {}", e))
                })?;
        }

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::NegotiationError(format!("Failed to create offer: {}", e)))?;

        debug!("Created offer for connection {}", self.connection_id);
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()> {
        let rtc = to_rtc_description(description)
            .map_err(|e| Error::NegotiationError(format!("Invalid local description: {}", e)))?;

        self.peer_connection
            .set_local_description(rtc)
            .await
            .map_err(|e| Error::NegotiationError(format!("Failed to set local description: {}", e)))
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.peer_connection
            .local_description()
            .await
            .map(|d| SessionDescription {
                sdp_type: from_rtc_sdp_type(d.sdp_type),
                sdp: d.sdp,
            })
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        let rtc = to_rtc_description(description)
            .map_err(|e| Error::DescriptionError(format!("Failed to parse remote description: {}", e)))?;

        self.peer_connection
            .set_remote_description(rtc)
            .await
            .map_err(|e| Error::DescriptionError(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate.clone(),
                sdp_mid: candidate.sdp_mid.clone(),
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: candidate.username_fragment.clone(),
            })
            .await
            .map_err(|e| Error::WebRtcError(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        info!("Closing transport engine {}", self.connection_id);
        self.audio_sender.write().await.take();
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::WebRtcError(format!("Failed to close connection: {}", e)))
    }
}

/// Outgoing Opus track
struct RtcAudioTrack {
    track: Arc<TrackLocalStaticSample>,
}

#[async_trait]
impl AudioSink for RtcAudioTrack {
    async fn write_frame(&self, frame: AudioFrame) -> Result<()> {
        let sample = Sample {
            data: frame.data,
            duration: frame.duration,
            ..Default::default()
        };

        self.track
            .write_sample(&sample)
            .await
            .map_err(|e| Error::WebRtcError(format!("Failed to write RTP sample: {}", e)))
    }
}

fn to_rtc_description(description: &SessionDescription) -> webrtc::error::Result<RTCSessionDescription> {
    let sdp = description.sdp.clone();
    match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(sdp),
        SdpType::Answer => RTCSessionDescription::answer(sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(sdp),
        SdpType::Rollback => Err(webrtc::Error::new("rollback is not supported".to_string())),
    }
}

fn from_rtc_sdp_type(sdp_type: RTCSdpType) -> SdpType {
    match sdp_type {
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => SdpType::Offer,
    }
}

fn from_candidate_init(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn map_connection_state(state: RTCIceConnectionState) -> Option<IceConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(IceConnectionState::New),
        RTCIceConnectionState::Checking => Some(IceConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(IceConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(IceConnectionState::Completed),
        RTCIceConnectionState::Failed => Some(IceConnectionState::Failed),
        RTCIceConnectionState::Disconnected => Some(IceConnectionState::Disconnected),
        RTCIceConnectionState::Closed => Some(IceConnectionState::Closed),
        _ => None,
    }
}
