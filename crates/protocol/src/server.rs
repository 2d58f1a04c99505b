//! Backend → client messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Answer, StatusKind, Turn};

/// Literal text payload the client sends as a keepalive.
pub const HEARTBEAT_PING: &str = "ping";

/// Literal text payload acknowledging a heartbeat; discarded without dispatch.
pub const HEARTBEAT_PONG: &str = "pong";

/// Status code key the backend embeds in a frame's content object when the
/// deployment gates queries on credentials.
pub const STATUS_CODE_KEY: &str = "X-Status-Code";

/// Body of a transient status frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: StatusKind,
    /// Free text describing the current backend phase.
    pub text: String,
}

/// Transient progress update streamed while a query is being processed.
/// Never persisted; buffered only for the duration of one outstanding query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFrame {
    pub content_type: String,
    pub content: StatusBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Terminal frame: ends a query's in-flight period and carries the Answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFrame {
    /// `"end"` in the normal case; any non-`"state"` value is terminal.
    pub content_type: String,
    pub session_id: String,
    pub content: Answer,
}

/// One inbound WebSocket frame, classified
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// Heartbeat acknowledgement.
    Pong,
    /// Frame whose content carries an `X-Status-Code` (auth gate).
    AuthGate(u16),
    /// Incremental status update (`content_type == "state"`).
    Status(StatusFrame),
    /// Terminal frame with the final answer.
    Result(ResultFrame),
}

impl InboundFrame {
    /// Classify a raw text frame. `Err` means the payload is not valid JSON
    /// or lacks fields the protocol requires; callers treat that as a local,
    /// user-visible parse error.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw == HEARTBEAT_PONG {
            return Ok(InboundFrame::Pong);
        }
        let value: Value = serde_json::from_str(raw)?;
        if let Some(code) = value
            .get("content")
            .and_then(|c| c.get(STATUS_CODE_KEY))
            .and_then(Value::as_u64)
        {
            return Ok(InboundFrame::AuthGate(code as u16));
        }
        if value.get("content_type").and_then(Value::as_str) == Some("state") {
            return serde_json::from_value(value).map(InboundFrame::Status);
        }
        serde_json::from_value(value).map(InboundFrame::Result)
    }
}

/// Persisted transcript for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<Turn>,
}

/// Configured model and data-profile options; the first entry of each list
/// is the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectDataResponse {
    #[serde(default)]
    pub bedrock_model_ids: Vec<String>,
    #[serde(default)]
    pub data_profiles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueryIntent;

    #[test]
    fn classifies_pong() {
        assert!(matches!(InboundFrame::parse("pong"), Ok(InboundFrame::Pong)));
    }

    #[test]
    fn classifies_status_frame() {
        let json = r#"{
          "content_type":"state",
          "content":{"status":"in-progress","text":"Generating SQL"}
        }"#;
        let frame = InboundFrame::parse(json).expect("parse status frame");
        match frame {
            InboundFrame::Status(status) => {
                assert_eq!(status.content.status, StatusKind::InProgress);
                assert_eq!(status.content.text, "Generating SQL");
                assert!(status.session_id.is_none());
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn classifies_result_frame() {
        let json = r#"{
          "content_type":"end",
          "session_id":"sess-1",
          "content":{"query":"revenue","query_intent":"normal_search"}
        }"#;
        let frame = InboundFrame::parse(json).expect("parse result frame");
        match frame {
            InboundFrame::Result(result) => {
                assert_eq!(result.session_id, "sess-1");
                assert_eq!(result.content.query_intent, QueryIntent::NormalSearch);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn classifies_auth_gate_before_content_type() {
        let json = r#"{"content":{"X-Status-Code":401}}"#;
        match InboundFrame::parse(json) {
            Ok(InboundFrame::AuthGate(code)) => assert_eq!(code, 401),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(InboundFrame::parse("{bad").is_err());
        // Valid JSON but not a protocol frame
        assert!(InboundFrame::parse("[1,2,3]").is_err());
    }

    #[test]
    fn non_state_content_type_is_terminal() {
        let json = r#"{
          "content_type":"final",
          "session_id":"sess-2",
          "content":{"query":"q","query_intent":"knowledge_search",
                     "knowledge_search_result":{"knowledge_response":"42"}}
        }"#;
        match InboundFrame::parse(json) {
            Ok(InboundFrame::Result(result)) => {
                assert_eq!(result.content_type, "final");
                let ks = result.content.knowledge_search_result.expect("payload");
                assert_eq!(ks.knowledge_response, "42");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
