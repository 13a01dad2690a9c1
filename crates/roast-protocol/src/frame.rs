//! Inbound frame classification.
//! - `status`: partial controller state, keys kept verbatim and in wire order
//! - `data`: one raw telemetry record, left unparsed
//! - anything else: unrecognized, with the reason

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::DecodeError;

pub const STATUS_TYPE: &str = "status";
pub const DATA_TYPE: &str = "data";

/// Partial status update: only the fields that changed on the server.
pub type StatusDelta = IndexMap<String, Value>;

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Status(StatusDelta),
    /// Comma-separated `timestamp,setpoint,output,temperature` record.
    Data(String),
    Unrecognized {
        raw: String,
        reason: DecodeError,
    },
}

impl InboundFrame {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => STATUS_TYPE,
            Self::Data(_) => DATA_TYPE,
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusFrame {
    #[serde(default)]
    data: Option<IndexMap<String, Value>>,
}

/// Classifies one raw text frame. Never fails: anything that is not a
/// well-formed `status` or `data` frame comes back as `Unrecognized`.
#[must_use]
pub fn decode_frame(raw: &str) -> InboundFrame {
    match classify(raw) {
        Ok(frame) => frame,
        Err(reason) => InboundFrame::Unrecognized {
            raw: raw.to_string(),
            reason,
        },
    }
}

fn classify(raw: &str) -> Result<InboundFrame, DecodeError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| DecodeError::InvalidJson(SmolStr::new(err.to_string())))?;
    let Value::Object(object) = value else {
        return Err(DecodeError::NotAnObject);
    };
    let Some(kind) = object.get("type").and_then(Value::as_str) else {
        return Err(DecodeError::MissingType);
    };
    match kind {
        STATUS_TYPE => decode_status(raw),
        DATA_TYPE => decode_sample(object.get("data")),
        other => Err(DecodeError::UnsupportedType(SmolStr::new(other))),
    }
}

// Re-parsed from the text so the delta keeps the server's key order.
fn decode_status(raw: &str) -> Result<InboundFrame, DecodeError> {
    match serde_json::from_str::<StatusFrame>(raw) {
        Ok(frame) => Ok(InboundFrame::Status(frame.data.unwrap_or_default())),
        Err(err) => Err(DecodeError::MalformedPayload {
            kind: SmolStr::new_inline(STATUS_TYPE),
            reason: SmolStr::new(err.to_string()),
        }),
    }
}

fn decode_sample(data: Option<&Value>) -> Result<InboundFrame, DecodeError> {
    match data {
        Some(Value::String(record)) => Ok(InboundFrame::Data(record.clone())),
        Some(other) => Err(DecodeError::MalformedPayload {
            kind: SmolStr::new_inline(DATA_TYPE),
            reason: SmolStr::new(format!("expected string record, got {other}")),
        }),
        None => Err(DecodeError::MalformedPayload {
            kind: SmolStr::new_inline(DATA_TYPE),
            reason: SmolStr::new_inline("missing data"),
        }),
    }
}
