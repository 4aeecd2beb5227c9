//! Payload classification for the assistant's event stream.
//!
//! Framing (line endings, partial frames, multi-line `data:` joins, comments)
//! is handled by `eventsource-stream`; this module decides what each
//! dispatched event's data means. The data is either a JSON envelope
//! `{"type": ..., "data": ...}` or the literal `[DONE]` sentinel.

use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;

use crate::{stream::ProtocolEvent, types::AnalysisPayload};

/// Literal payload marking the logical end of an answer
pub const DONE_SENTINEL: &str = "[DONE]";

/// Upper bound on bytes received without a complete frame
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Result of decoding one dispatched event
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(ProtocolEvent),
    /// The `[DONE]` sentinel
    Sentinel,
    Skipped(SkipReason),
}

/// Why a frame contributed no event
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Empty data
    NoData,
    /// Payload was not a valid envelope
    Malformed(String),
    /// Envelope with a `type` we do not know
    UnknownType(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Per-stream frame classifier.
///
/// Keeps the counters one response needs: how many frames were skipped as
/// malformed and whether the sentinel arrived.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    malformed: usize,
    saw_sentinel: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the data of one dispatched event
    pub fn decode(&mut self, data: &str) -> Option<ProtocolEvent> {
        match decode_frame(data) {
            Frame::Event(event) => Some(event),
            Frame::Sentinel => {
                tracing::debug!("Swallowed end-of-stream sentinel");
                self.saw_sentinel = true;
                None
            }
            Frame::Skipped(SkipReason::NoData) => None,
            Frame::Skipped(SkipReason::Malformed(reason)) => {
                self.skip_malformed(reason);
                None
            }
            Frame::Skipped(SkipReason::UnknownType(kind)) => {
                tracing::debug!("Dropping frame with unknown type {:?}", kind);
                None
            }
        }
    }

    /// Record a frame the framer itself could not read
    pub fn skip_malformed(&mut self, reason: impl Display) {
        self.malformed += 1;
        tracing::warn!("Skipping malformed frame: {}", reason);
    }

    /// Number of frames skipped because their payload was malformed
    pub fn malformed_frames(&self) -> usize {
        self.malformed
    }

    /// Whether the `[DONE]` sentinel has been seen
    pub fn saw_sentinel(&self) -> bool {
        self.saw_sentinel
    }
}

/// Classify the joined `data:` value of a single event
pub fn decode_frame(data: &str) -> Frame {
    let data = data.trim();
    if data.is_empty() {
        return Frame::Skipped(SkipReason::NoData);
    }
    if data == DONE_SENTINEL {
        return Frame::Sentinel;
    }

    decode_payload(data)
}

fn decode_payload(data: &str) -> Frame {
    let envelope: Envelope = match serde_json::from_str(data) {
        Ok(envelope) => envelope,
        Err(e) => return Frame::Skipped(SkipReason::Malformed(e.to_string())),
    };

    match envelope.kind.as_str() {
        "token" => match envelope.data {
            Value::String(text) => Frame::Event(ProtocolEvent::Token(text)),
            other => Frame::Skipped(SkipReason::Malformed(format!(
                "token data must be a string, got {}",
                other
            ))),
        },
        "analysis" => match serde_json::from_value::<AnalysisPayload>(envelope.data) {
            Ok(payload) => Frame::Event(ProtocolEvent::Analysis(payload)),
            Err(e) => Frame::Skipped(SkipReason::Malformed(format!("analysis: {}", e))),
        },
        "error" => {
            let message = match envelope.data {
                Value::String(message) => message,
                Value::Null => "unknown server error".to_string(),
                other => other.to_string(),
            };
            Frame::Event(ProtocolEvent::Error(message))
        }
        other => Frame::Skipped(SkipReason::UnknownType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str) -> ProtocolEvent {
        ProtocolEvent::Token(text.to_string())
    }

    #[test]
    fn test_malformed_frames_are_counted_and_skipped() {
        let mut decoder = FrameDecoder::new();
        let events: Vec<_> = [
            r#"{"type":"token","data":"a"}"#,
            "{not-json}",
            r#"{"type":"token","data":"b"}"#,
        ]
        .into_iter()
        .filter_map(|data| decoder.decode(data))
        .collect();
        assert_eq!(events, vec![token("a"), token("b")]);
        assert_eq!(decoder.malformed_frames(), 1);
    }

    #[test]
    fn test_sentinel_is_recorded_not_emitted() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode("[DONE]"), None);
        assert!(decoder.saw_sentinel());
        assert_eq!(decoder.malformed_frames(), 0);
    }

    #[test]
    fn test_frames_after_sentinel_still_decode() {
        let mut decoder = FrameDecoder::new();
        decoder.decode(DONE_SENTINEL);
        assert_eq!(
            decoder.decode(r#"{"type":"token","data":"late"}"#),
            Some(token("late"))
        );
    }

    #[test]
    fn test_framer_errors_count_as_malformed() {
        let mut decoder = FrameDecoder::new();
        decoder.skip_malformed("invalid utf-8 sequence");
        assert_eq!(decoder.malformed_frames(), 1);
        assert!(!decoder.saw_sentinel());
    }

    #[test]
    fn test_empty_data_is_skipped_silently() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decode_frame(""), Frame::Skipped(SkipReason::NoData));
        assert_eq!(decoder.decode("  \n"), None);
        assert_eq!(decoder.malformed_frames(), 0);
    }

    #[test]
    fn test_decode_analysis_frame() {
        let data = r#"{"type": "analysis", "data": {"strategy": "graph", "complexity": 0.4, "relevantDocuments": []}}"#;
        match decode_frame(data) {
            Frame::Event(ProtocolEvent::Analysis(payload)) => {
                assert_eq!(payload.strategy, "graph");
                assert_eq!(payload.complexity, 0.4);
            }
            other => panic!("expected analysis, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_frame() {
        assert_eq!(
            decode_frame(r#"{"type": "error", "data": "milvus unavailable"}"#),
            Frame::Event(ProtocolEvent::Error("milvus unavailable".into()))
        );
        assert_eq!(
            decode_frame(r#"{"type": "error"}"#),
            Frame::Event(ProtocolEvent::Error("unknown server error".into()))
        );
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        assert_eq!(
            decode_frame(r#"{"type": "heartbeat", "data": 1}"#),
            Frame::Skipped(SkipReason::UnknownType("heartbeat".into()))
        );
    }

    #[test]
    fn test_non_string_token_is_malformed() {
        assert!(matches!(
            decode_frame(r#"{"type": "token", "data": 42}"#),
            Frame::Skipped(SkipReason::Malformed(_))
        ));
    }

    #[test]
    fn test_multi_line_payload_is_valid_json() {
        let data = "{\"type\":\"token\",\n\"data\":\"joined\"}";
        assert_eq!(decode_frame(data), Frame::Event(token("joined")));
    }
}
