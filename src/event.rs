//! Turns decoded frames into content deltas.
//!
//! A malformed payload is an anomaly of a single frame.  It is logged and
//! counted, and the frame is skipped; it never ends the reply.

use tracing::warn;

use crate::observability::PAYLOAD_ANOMALIES;
use crate::{ContentChunk, Delta, Error, Frame, FrameKind, Result};

/// Parse one frame into a delta.
///
/// Returns `None` for ignorable frames and for data frames whose payload is
/// not a JSON object with a string `content` field.
pub fn parse_frame(frame: &Frame) -> Option<Delta> {
    match frame.kind {
        FrameKind::Terminator => Some(Delta::EndOfReply),
        FrameKind::Ignorable => None,
        FrameKind::Data => match parse_payload(&frame.payload) {
            Ok(delta) => Some(delta),
            Err(err) => {
                warn!(payload = %frame.payload, "skipping frame: {err}");
                PAYLOAD_ANOMALIES.click();
                None
            }
        },
    }
}

/// Parse the payload of a data frame.
pub fn parse_payload(payload: &str) -> Result<Delta> {
    serde_json::from_str::<ContentChunk>(payload)
        .map(Delta::from)
        .map_err(|e| {
            Error::serialization(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            )
        })
}
