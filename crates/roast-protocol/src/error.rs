//! Protocol error taxonomy.

use smol_str::SmolStr;
use thiserror::Error;

/// Reason an inbound frame could not be classified as `status` or `data`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame text is not JSON.
    #[error("invalid json: {0}")]
    InvalidJson(SmolStr),

    /// Frame decoded to something other than an object.
    #[error("frame is not a json object")]
    NotAnObject,

    /// Object carries no string `type` discriminator.
    #[error("frame has no type")]
    MissingType,

    /// `type` names a kind the client does not consume.
    #[error("unsupported frame type '{0}'")]
    UnsupportedType(SmolStr),

    /// Known `type`, but its `data` payload has the wrong shape.
    #[error("malformed '{kind}' payload: {reason}")]
    MalformedPayload { kind: SmolStr, reason: SmolStr },
}

/// Errors raised while decoding, reconciling, or building protocol messages.
///
/// None of these end a session. Callers recover locally and keep processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Inbound frame could not be classified.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A status field or parameter value cannot be converted to its type.
    #[error("invalid value for '{field}': expected {expected}, got {found}")]
    FieldCoercion {
        field: SmolStr,
        expected: &'static str,
        found: SmolStr,
    },

    /// Telemetry record has the wrong field count or a non-numeric field.
    #[error("malformed sample '{raw}': {reason}")]
    MalformedSample { raw: SmolStr, reason: SmolStr },

    /// Lifecycle command outside the fixed command set.
    #[error("invalid command '{0}'")]
    InvalidCommand(SmolStr),

    /// Parameter name outside the tunable parameter set.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(SmolStr),

    /// Program profile failed validation or could not be loaded.
    #[error("invalid program: {0}")]
    InvalidProgram(SmolStr),
}

impl ProtocolError {
    pub(crate) fn coercion(field: &str, expected: &'static str, found: impl AsRef<str>) -> Self {
        Self::FieldCoercion {
            field: SmolStr::new(field),
            expected,
            found: SmolStr::new(found.as_ref()),
        }
    }
}

/// Builds a [`ProtocolError::FieldCoercion`] describing a JSON value.
#[must_use]
pub fn coercion_error(
    field: &str,
    expected: &'static str,
    found: &serde_json::Value,
) -> ProtocolError {
    ProtocolError::coercion(field, expected, found.to_string())
}
