//! Hub wire protocol (SignalR JSON protocol, version 1).
//!
//! Every record is a JSON object terminated by [`RECORD_SEPARATOR`]. A single
//! WebSocket text message may carry several records, and the first server
//! message additionally starts with the handshake response.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Terminates every record on the wire.
pub const RECORD_SEPARATOR: char = '\u{1e}';

pub const PROTOCOL_NAME: &str = "json";
pub const PROTOCOL_VERSION: u32 = 1;

const TYPE_INVOCATION: u8 = 1;
const TYPE_COMPLETION: u8 = 3;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

#[derive(Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// The handshake record the client sends right after the socket opens.
pub fn handshake_request() -> String {
    let body = serde_json::json!({
        "protocol": PROTOCOL_NAME,
        "version": PROTOCOL_VERSION,
    });
    format!("{}{}", body, RECORD_SEPARATOR)
}

/// Consume the handshake response at the start of `text`.
///
/// Returns whatever follows the handshake record, which may already contain
/// hub messages.
pub fn parse_handshake_response(text: &str) -> Result<&str, ProtocolError> {
    let Some((record, rest)) = text.split_once(RECORD_SEPARATOR) else {
        return Err(ProtocolError::Handshake(
            "missing record separator".to_string(),
        ));
    };
    let response: HandshakeResponse = serde_json::from_str(record)
        .map_err(|e| ProtocolError::Handshake(e.to_string()))?;
    match response.error {
        Some(error) => Err(ProtocolError::Handshake(error)),
        None => Ok(rest),
    }
}

/// A named method call, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct HubInvocation {
    pub target: String,
    pub arguments: Vec<Value>,
    pub invocation_id: Option<String>,
}

impl HubInvocation {
    pub fn new(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            arguments,
            invocation_id: None,
        }
    }

    /// Decode the argument at `index` into `T`.
    pub fn argument<T: DeserializeOwned>(&self, index: usize) -> Result<T, ProtocolError> {
        let value = self
            .arguments
            .get(index)
            .cloned()
            .ok_or_else(|| ProtocolError::Payload {
                target: self.target.clone(),
                reason: format!("missing argument {}", index),
            })?;
        serde_json::from_value(value).map_err(|e| ProtocolError::Payload {
            target: self.target.clone(),
            reason: e.to_string(),
        })
    }

    /// Encode as a non-blocking invocation record (no invocation ID, so the
    /// server sends no completion).
    pub fn encode(&self) -> String {
        let mut body = serde_json::json!({
            "type": TYPE_INVOCATION,
            "target": self.target,
            "arguments": self.arguments,
        });
        if let Some(id) = &self.invocation_id {
            body["invocationId"] = Value::String(id.clone());
        }
        format!("{}{}", body, RECORD_SEPARATOR)
    }
}

/// A decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation(HubInvocation),
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Stream items and other record types this client never requests.
    Ignored(u8),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

impl HubMessage {
    pub fn ping() -> String {
        format!("{{\"type\":{}}}{}", TYPE_PING, RECORD_SEPARATOR)
    }

    fn decode(record: &str) -> Result<Self, ProtocolError> {
        let raw: RawRecord =
            serde_json::from_str(record).map_err(|e| ProtocolError::Frame(e.to_string()))?;
        match raw.kind {
            TYPE_INVOCATION => {
                let target = raw
                    .target
                    .ok_or_else(|| ProtocolError::Frame("invocation without target".to_string()))?;
                Ok(HubMessage::Invocation(HubInvocation {
                    target,
                    arguments: raw.arguments,
                    invocation_id: raw.invocation_id,
                }))
            }
            TYPE_COMPLETION => Ok(HubMessage::Completion {
                invocation_id: raw.invocation_id.unwrap_or_default(),
                result: raw.result,
                error: raw.error,
            }),
            TYPE_PING => Ok(HubMessage::Ping),
            TYPE_CLOSE => Ok(HubMessage::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            }),
            other => Ok(HubMessage::Ignored(other)),
        }
    }
}

/// Split a text message into its non-empty records.
pub fn split_records(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

/// Decode every record in a text message. A malformed record does not stop
/// the records after it.
pub fn decode_records(text: &str) -> Vec<Result<HubMessage, ProtocolError>> {
    split_records(text).map(HubMessage::decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handshake_request_is_terminated() {
        let request = handshake_request();
        assert!(request.ends_with(RECORD_SEPARATOR));
        let body: Value = serde_json::from_str(request.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(body, json!({"protocol": "json", "version": 1}));
    }

    #[test]
    fn handshake_response_returns_trailing_records() {
        let text = format!(
            "{{}}{rs}{{\"type\":6}}{rs}",
            rs = RECORD_SEPARATOR
        );
        let rest = parse_handshake_response(&text).unwrap();
        assert_eq!(decode_records(rest), vec![Ok(HubMessage::Ping)]);
    }

    #[test]
    fn handshake_error_is_reported() {
        let text = format!("{{\"error\":\"unsupported\"}}{}", RECORD_SEPARATOR);
        assert_eq!(
            parse_handshake_response(&text),
            Err(ProtocolError::Handshake("unsupported".to_string()))
        );
        assert!(parse_handshake_response("{}").is_err());
    }

    #[test]
    fn decodes_mixed_records_and_keeps_going_after_garbage() {
        let text = format!(
            "{{\"type\":1,\"target\":\"PositionReleased\",\"arguments\":[\"pos-1\"]}}{rs}not json{rs}{{\"type\":7,\"error\":\"bye\",\"allowReconnect\":true}}{rs}{{\"type\":2}}{rs}",
            rs = RECORD_SEPARATOR
        );
        let decoded = decode_records(&text);
        assert_eq!(decoded.len(), 4);
        assert_eq!(
            decoded[0],
            Ok(HubMessage::Invocation(HubInvocation::new(
                "PositionReleased",
                vec![json!("pos-1")]
            )))
        );
        assert!(matches!(decoded[1], Err(ProtocolError::Frame(_))));
        assert_eq!(
            decoded[2],
            Ok(HubMessage::Close {
                error: Some("bye".to_string()),
                allow_reconnect: true
            })
        );
        assert_eq!(decoded[3], Ok(HubMessage::Ignored(2)));
    }

    #[test]
    fn invocation_encoding_is_parseable_by_the_decoder() {
        let invocation = HubInvocation::new("JoinSession", vec![json!("session-9")]);
        let encoded = invocation.encode();
        assert!(!encoded.contains("invocationId"));
        assert_eq!(
            decode_records(&encoded),
            vec![Ok(HubMessage::Invocation(invocation))]
        );
    }

    #[test]
    fn argument_decoding_reports_target() {
        let invocation = HubInvocation::new("UserTyping", vec![]);
        let err = invocation.argument::<String>(0).unwrap_err();
        assert!(matches!(err, ProtocolError::Payload { ref target, .. } if target == "UserTyping"));
    }
}
