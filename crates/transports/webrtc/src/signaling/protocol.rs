//! Babelcast signaling protocol types
//!
//! Every frame on the signaling socket is a JSON envelope
//! `{"Key": <kind>, "Value": <payload>}`. The payload shape depends on the
//! kind; kinds this client does not know are ignored rather than rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wire envelope shared by every signaling message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Message kind
    #[serde(rename = "Key")]
    pub key: String,

    /// Kind-specific payload
    #[serde(rename = "Value", default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

/// Every message kind the client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Relay connect request (producer page)
    Connect,
    /// Publish request with channel credentials
    ConnectPublisher,
    /// Subscribe request for a channel
    ConnectSubscriber,
    /// Local description, generic form
    Session,
    /// Local description sent by a publisher
    SessionPublisher,
    /// Local description sent by a subscriber
    SessionSubscriber,
    /// Remote answer description
    SdAnswer,
    /// Trickled ICE candidate (either direction)
    IceCandidate,
    /// Directory request
    GetChannels,
    /// Directory response
    Channels,
    /// Informational text from the backend
    Info,
    /// Error text from the backend
    Error,
    /// The backend wants a password before accepting the publish
    PasswordRequired,
    /// The publisher of a channel went away
    ChannelClosed,
    /// The backend acknowledged a session description
    SessionReceived,
    /// Chat message relayed by the backend
    Msg,
}

impl MessageKind {
    /// All known kinds
    pub const ALL: [MessageKind; 16] = [
        MessageKind::Connect,
        MessageKind::ConnectPublisher,
        MessageKind::ConnectSubscriber,
        MessageKind::Session,
        MessageKind::SessionPublisher,
        MessageKind::SessionSubscriber,
        MessageKind::SdAnswer,
        MessageKind::IceCandidate,
        MessageKind::GetChannels,
        MessageKind::Channels,
        MessageKind::Info,
        MessageKind::Error,
        MessageKind::PasswordRequired,
        MessageKind::ChannelClosed,
        MessageKind::SessionReceived,
        MessageKind::Msg,
    ];

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Connect => "connect",
            MessageKind::ConnectPublisher => "connect_publisher",
            MessageKind::ConnectSubscriber => "connect_subscriber",
            MessageKind::Session => "session",
            MessageKind::SessionPublisher => "session_publisher",
            MessageKind::SessionSubscriber => "session_subscriber",
            MessageKind::SdAnswer => "sd_answer",
            MessageKind::IceCandidate => "ice_candidate",
            MessageKind::GetChannels => "get_channels",
            MessageKind::Channels => "channels",
            MessageKind::Info => "info",
            MessageKind::Error => "error",
            MessageKind::PasswordRequired => "password_required",
            MessageKind::ChannelClosed => "channel_closed",
            MessageKind::SessionReceived => "session_received",
            MessageKind::Msg => "msg",
        }
    }

    /// Look up a kind by wire name
    pub fn from_wire(key: &str) -> Option<Self> {
        MessageKind::ALL.iter().copied().find(|k| k.as_str() == key)
    }

    /// Whether this kind carries a local session description
    pub fn is_session(&self) -> bool {
        matches!(
            self,
            MessageKind::Session | MessageKind::SessionPublisher | MessageKind::SessionSubscriber
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SDP type of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Offer
    Offer,
    /// Provisional answer
    Pranswer,
    /// Final answer
    Answer,
    /// Rollback
    Rollback,
}

/// Session description as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Description type
    #[serde(rename = "type")]
    pub sdp_type: SdpType,

    /// SDP body
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Number of `a=candidate` lines embedded in the SDP
    pub fn candidate_count(&self) -> usize {
        self.sdp
            .lines()
            .filter(|l| l.trim_start().starts_with("a=candidate"))
            .count()
    }
}

/// ICE candidate in browser `RTCIceCandidateInit` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate attribute line
    pub candidate: String,

    /// Media stream identification tag
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Media line index
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,

    /// ICE username fragment
    #[serde(rename = "usernameFragment", default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Create a candidate with only the attribute line set
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }

    /// End-of-candidates markers carry an empty attribute line
    pub fn is_empty(&self) -> bool {
        self.candidate.trim().is_empty()
    }
}

/// Payload of `connect_publisher`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConnectParams {
    /// Channel to publish into
    #[serde(rename = "Channel")]
    pub channel: String,

    /// Channel password (may be empty)
    #[serde(rename = "Password", default)]
    pub password: String,
}

/// Payload of `connect_subscriber`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConnectParams {
    /// Channel to subscribe to
    #[serde(rename = "Channel")]
    pub channel: String,

    /// Local description, attached when it is already complete
    #[serde(
        rename = "SessionDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_description: Option<SessionDescription>,
}

/// Payload of the relay `connect` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConnectParams {
    /// Relay URL
    #[serde(rename = "Url", default)]
    pub url: String,

    /// Relay host name
    #[serde(rename = "Hostname", default)]
    pub hostname: String,

    /// Relay port
    #[serde(rename = "Port", default)]
    pub port: u16,

    /// User name on the relay
    #[serde(rename = "Username", default)]
    pub username: String,

    /// Channel on the relay
    #[serde(rename = "Channel", default)]
    pub channel: String,

    /// Raw local SDP
    #[serde(rename = "SessionDescription", default)]
    pub session_description: String,
}

/// Chat message relayed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender display name
    #[serde(rename = "Sender", default)]
    pub sender: String,

    /// Message body
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// A decoded signaling message
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Relay connect request
    Connect(RelayConnectParams),
    /// Publish request
    ConnectPublisher(PublisherConnectParams),
    /// Subscribe request
    ConnectSubscriber(SubscriberConnectParams),
    /// Local description, generic form
    Session(SessionDescription),
    /// Local description from a publisher
    SessionPublisher(SessionDescription),
    /// Local description from a subscriber
    SessionSubscriber(SessionDescription),
    /// Remote answer
    SdAnswer(SessionDescription),
    /// Trickled candidate
    IceCandidate(IceCandidate),
    /// Directory request
    GetChannels,
    /// Directory response
    Channels(Vec<String>),
    /// Informational text
    Info(String),
    /// Backend error text
    Error(String),
    /// Password needed before the publish is accepted
    PasswordRequired,
    /// Publisher of the named channel left
    ChannelClosed(String),
    /// Backend acknowledged our session description
    SessionReceived,
    /// Chat message
    Msg(ChatMessage),
    /// A known kind whose payload could not be decoded
    ///
    /// Only produced by [`ChannelMessage::decode`]; never encodable.
    Malformed {
        /// Kind named by the envelope
        kind: MessageKind,
        /// Why the payload was rejected
        reason: String,
    },
}

impl ChannelMessage {
    /// Kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            ChannelMessage::Connect(_) => MessageKind::Connect,
            ChannelMessage::ConnectPublisher(_) => MessageKind::ConnectPublisher,
            ChannelMessage::ConnectSubscriber(_) => MessageKind::ConnectSubscriber,
            ChannelMessage::Session(_) => MessageKind::Session,
            ChannelMessage::SessionPublisher(_) => MessageKind::SessionPublisher,
            ChannelMessage::SessionSubscriber(_) => MessageKind::SessionSubscriber,
            ChannelMessage::SdAnswer(_) => MessageKind::SdAnswer,
            ChannelMessage::IceCandidate(_) => MessageKind::IceCandidate,
            ChannelMessage::GetChannels => MessageKind::GetChannels,
            ChannelMessage::Channels(_) => MessageKind::Channels,
            ChannelMessage::Info(_) => MessageKind::Info,
            ChannelMessage::Error(_) => MessageKind::Error,
            ChannelMessage::PasswordRequired => MessageKind::PasswordRequired,
            ChannelMessage::ChannelClosed(_) => MessageKind::ChannelClosed,
            ChannelMessage::SessionReceived => MessageKind::SessionReceived,
            ChannelMessage::Msg(_) => MessageKind::Msg,
            ChannelMessage::Malformed { kind, .. } => *kind,
        }
    }

    /// Build the session message of the given kind
    ///
    /// Falls back to the generic `session` kind when `kind` is not one of
    /// the three session kinds.
    pub fn session(kind: MessageKind, description: SessionDescription) -> Self {
        match kind {
            MessageKind::SessionPublisher => ChannelMessage::SessionPublisher(description),
            MessageKind::SessionSubscriber => ChannelMessage::SessionSubscriber(description),
            _ => ChannelMessage::Session(description),
        }
    }

    /// Convert to the wire envelope
    pub fn to_envelope(&self) -> crate::Result<Envelope> {
        let value = match self {
            ChannelMessage::Connect(p) => serde_json::to_value(p)?,
            ChannelMessage::ConnectPublisher(p) => serde_json::to_value(p)?,
            ChannelMessage::ConnectSubscriber(p) => serde_json::to_value(p)?,
            ChannelMessage::Session(d)
            | ChannelMessage::SessionPublisher(d)
            | ChannelMessage::SessionSubscriber(d) => serde_json::to_value(d)?,
            // The backend sends the answer as a bare SDP string
            ChannelMessage::SdAnswer(d) => Value::String(d.sdp.clone()),
            ChannelMessage::IceCandidate(c) => serde_json::to_value(c)?,
            ChannelMessage::Channels(list) => serde_json::to_value(list)?,
            ChannelMessage::Info(s) | ChannelMessage::Error(s) | ChannelMessage::ChannelClosed(s) => {
                Value::String(s.clone())
            }
            ChannelMessage::Msg(m) => serde_json::to_value(m)?,
            ChannelMessage::Malformed { kind, .. } => {
                return Err(crate::Error::SerializationError(format!(
                    "Cannot encode malformed {} message",
                    kind
                )));
            }
            ChannelMessage::GetChannels
            | ChannelMessage::PasswordRequired
            | ChannelMessage::SessionReceived => Value::Null,
        };

        Ok(Envelope {
            key: self.kind().as_str().to_string(),
            value,
        })
    }

    /// Convert message to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(&self.to_envelope()?).map_err(|e| {
            crate::Error::SerializationError(format!(
                "Failed to serialize {} message: {}",
                self.kind(),
                e
            ))
        })
    }

    /// Decode an envelope
    ///
    /// Returns `Ok(None)` for kinds this client does not know.
    pub fn from_envelope(envelope: Envelope) -> crate::Result<Option<Self>> {
        let Some(kind) = MessageKind::from_wire(&envelope.key) else {
            return Ok(None);
        };
        let value = envelope.value;

        let message = match kind {
            MessageKind::Connect => ChannelMessage::Connect(parse_payload(kind, value)?),
            MessageKind::ConnectPublisher => {
                ChannelMessage::ConnectPublisher(parse_payload(kind, value)?)
            }
            MessageKind::ConnectSubscriber => {
                ChannelMessage::ConnectSubscriber(parse_payload(kind, value)?)
            }
            MessageKind::Session => {
                ChannelMessage::Session(parse_description(kind, value, SdpType::Offer)?)
            }
            MessageKind::SessionPublisher => {
                ChannelMessage::SessionPublisher(parse_description(kind, value, SdpType::Offer)?)
            }
            MessageKind::SessionSubscriber => {
                ChannelMessage::SessionSubscriber(parse_description(kind, value, SdpType::Offer)?)
            }
            MessageKind::SdAnswer => {
                ChannelMessage::SdAnswer(parse_description(kind, value, SdpType::Answer)?)
            }
            MessageKind::IceCandidate => ChannelMessage::IceCandidate(parse_payload(kind, value)?),
            MessageKind::GetChannels => ChannelMessage::GetChannels,
            MessageKind::Channels => {
                // A backend with no channels may send null instead of []
                if value.is_null() {
                    ChannelMessage::Channels(Vec::new())
                } else {
                    ChannelMessage::Channels(parse_payload(kind, value)?)
                }
            }
            MessageKind::Info => ChannelMessage::Info(text_payload(value)),
            MessageKind::Error => ChannelMessage::Error(text_payload(value)),
            MessageKind::PasswordRequired => ChannelMessage::PasswordRequired,
            MessageKind::ChannelClosed => ChannelMessage::ChannelClosed(text_payload(value)),
            MessageKind::SessionReceived => ChannelMessage::SessionReceived,
            MessageKind::Msg => ChannelMessage::Msg(parse_payload(kind, value)?),
        };

        Ok(Some(message))
    }

    /// Parse a message from a JSON frame
    ///
    /// Returns `Ok(None)` for kinds this client does not know.
    pub fn from_json(json: &str) -> crate::Result<Option<Self>> {
        let envelope: Envelope = serde_json::from_str(json).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to parse signaling envelope: {}", e))
        })?;
        Self::from_envelope(envelope)
    }

    /// Decode an inbound frame for dispatch
    ///
    /// Like [`ChannelMessage::from_json`], except that a known kind with an
    /// undecodable payload comes back as [`ChannelMessage::Malformed`] so the
    /// receiver can react to it. Only a frame that is not an envelope at all
    /// is an error.
    pub fn decode(json: &str) -> crate::Result<Option<Self>> {
        let envelope: Envelope = serde_json::from_str(json).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to parse signaling envelope: {}", e))
        })?;
        let Some(kind) = MessageKind::from_wire(&envelope.key) else {
            return Ok(None);
        };

        match Self::from_envelope(envelope) {
            Ok(message) => Ok(message),
            Err(crate::Error::SerializationError(reason)) => {
                Ok(Some(ChannelMessage::Malformed { kind, reason }))
            }
            Err(other) => Ok(Some(ChannelMessage::Malformed {
                kind,
                reason: other.to_string(),
            })),
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(kind: MessageKind, value: Value) -> crate::Result<T> {
    serde_json::from_value(value).map_err(|e| {
        crate::Error::SerializationError(format!("Invalid {} payload: {}", kind, e))
    })
}

/// Accepts a bare SDP string, a `{type, sdp}` object, or the legacy
/// `{SessionDescription: sdp}` record.
fn parse_description(
    kind: MessageKind,
    value: Value,
    default_type: SdpType,
) -> crate::Result<SessionDescription> {
    match value {
        Value::String(sdp) => Ok(SessionDescription {
            sdp_type: default_type,
            sdp,
        }),
        Value::Object(map) => {
            if map.contains_key("sdp") {
                return parse_payload(kind, Value::Object(map));
            }
            match map.get("SessionDescription") {
                Some(Value::String(sdp)) => Ok(SessionDescription {
                    sdp_type: default_type,
                    sdp: sdp.clone(),
                }),
                _ => Err(crate::Error::SerializationError(format!(
                    "Invalid {} payload: missing sdp",
                    kind
                ))),
            }
        }
        other => Err(crate::Error::SerializationError(format!(
            "Invalid {} payload: expected description, got {}",
            kind, other
        ))),
    }
}

fn text_payload(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Check a channel name the way the backend does
///
/// Names must be non-empty and contain only ASCII letters, digits and spaces.
pub fn validate_channel_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidChannelName(
            "channel cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
        return Err(crate::Error::InvalidChannelName(format!(
            "channel '{}' must contain only alphanumeric characters",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_publisher_wire_shape() {
        let msg = ChannelMessage::ConnectPublisher(PublisherConnectParams {
            channel: "radio".to_string(),
            password: "".to_string(),
        });

        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Key": "connect_publisher", "Value": {"Channel": "radio", "Password": ""}})
        );
    }

    #[test]
    fn test_get_channels_has_no_value() {
        let json = ChannelMessage::GetChannels.to_json().unwrap();
        assert_eq!(json, r#"{"Key":"get_channels"}"#);
    }

    #[test]
    fn test_subscriber_connect_omits_missing_description() {
        let msg = ChannelMessage::ConnectSubscriber(SubscriberConnectParams {
            channel: "radio".to_string(),
            session_description: None,
        });
        let json = msg.to_json().unwrap();
        assert!(!json.contains("SessionDescription"));

        let msg = ChannelMessage::ConnectSubscriber(SubscriberConnectParams {
            channel: "radio".to_string(),
            session_description: Some(SessionDescription::offer("v=0")),
        });
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["Value"]["SessionDescription"]["type"], "offer");
    }

    #[test]
    fn test_session_kinds_carry_description_object() {
        let msg = ChannelMessage::session(MessageKind::SessionPublisher, SessionDescription::offer("v=0"));
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["Key"], "session_publisher");
        assert_eq!(json["Value"], serde_json::json!({"type": "offer", "sdp": "v=0"}));

        let msg = ChannelMessage::session(MessageKind::Info, SessionDescription::offer("v=0"));
        assert_eq!(msg.kind(), MessageKind::Session);
    }

    #[test]
    fn test_answer_accepts_string_and_object() {
        let from_string = ChannelMessage::from_json(r#"{"Key":"sd_answer","Value":"v=0\r\n"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(from_string, ChannelMessage::SdAnswer(SessionDescription::answer("v=0\r\n")));

        let from_object =
            ChannelMessage::from_json(r#"{"Key":"sd_answer","Value":{"type":"answer","sdp":"v=0"}}"#)
                .unwrap()
                .unwrap();
        assert_eq!(from_object, ChannelMessage::SdAnswer(SessionDescription::answer("v=0")));
    }

    #[test]
    fn test_legacy_session_record() {
        let msg = ChannelMessage::from_json(r#"{"Key":"session","Value":{"SessionDescription":"v=0"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg, ChannelMessage::Session(SessionDescription::offer("v=0")));
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        assert_eq!(ChannelMessage::from_json(r#"{"Key":"pong","Value":1}"#).unwrap(), None);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let err = ChannelMessage::from_json(r#"{"Key":"channels","Value":{"a":1}}"#).unwrap_err();
        assert!(err.to_string().contains("channels"));
        assert!(ChannelMessage::from_json("[1,2]").is_err());
    }

    #[test]
    fn test_decode_keeps_kind_of_malformed_payload() {
        let msg = ChannelMessage::decode(r#"{"Key":"sd_answer","Value":42}"#).unwrap().unwrap();
        assert_eq!(msg.kind(), MessageKind::SdAnswer);
        assert!(matches!(
            &msg,
            ChannelMessage::Malformed { reason, .. } if reason.contains("sd_answer")
        ));
        assert!(msg.to_json().is_err());

        assert_eq!(ChannelMessage::decode(r#"{"Key":"pong","Value":{}}"#).unwrap(), None);
        assert!(ChannelMessage::decode("not json").is_err());
    }

    #[test]
    fn test_channels_null_is_empty() {
        let msg = ChannelMessage::from_json(r#"{"Key":"channels","Value":null}"#).unwrap().unwrap();
        assert_eq!(msg, ChannelMessage::Channels(Vec::new()));
    }

    #[test]
    fn test_text_payloads() {
        let msg = ChannelMessage::from_json(r#"{"Key":"error","Value":"channel full"}"#).unwrap().unwrap();
        assert_eq!(msg, ChannelMessage::Error("channel full".to_string()));

        let msg = ChannelMessage::from_json(r#"{"Key":"password_required"}"#).unwrap().unwrap();
        assert_eq!(msg, ChannelMessage::PasswordRequired);

        let msg = ChannelMessage::from_json(r#"{"Key":"channel_closed","Value":"radio"}"#).unwrap().unwrap();
        assert_eq!(msg, ChannelMessage::ChannelClosed("radio".to_string()));
    }

    #[test]
    fn test_ice_candidate_browser_field_names() {
        let msg = ChannelMessage::IceCandidate(IceCandidate {
            candidate: "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        });
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["Value"]["sdpMid"], "0");
        assert_eq!(json["Value"]["sdpMLineIndex"], 0);
        assert!(json["Value"].get("usernameFragment").is_none());
    }

    #[test]
    fn test_candidate_count() {
        let desc = SessionDescription::offer("v=0\r\na=candidate:1 1 udp 1 1.2.3.4 5 typ host\r\na=candidate:2 1 udp 1 1.2.3.4 6 typ srflx\r\n");
        assert_eq!(desc.candidate_count(), 2);
    }

    #[test]
    fn test_kind_wire_names_round_trip() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_wire(kind.as_str()), Some(kind));
        }
        assert!(MessageKind::SessionSubscriber.is_session());
        assert!(!MessageKind::SdAnswer.is_session());
    }

    #[test]
    fn test_validate_channel_name() {
        assert!(validate_channel_name("radio one").is_ok());
        assert!(validate_channel_name("").is_err());
        assert!(matches!(
            validate_channel_name("radio/1"),
            Err(crate::Error::InvalidChannelName(_))
        ));
    }
}
