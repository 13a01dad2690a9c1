//! `roast-protocol` - wire protocol spoken by the roast controller over its
//! WebSocket interface.
//!
//! Inbound frames are JSON objects tagged by `type` (`status` deltas and
//! `data` samples). Outbound messages are lifecycle commands, parameter
//! changes, and program uploads.

#![forbid(unsafe_code)]

/// Lifecycle command and parameter vocabularies.
pub mod command;
/// Outbound envelopes.
pub mod envelope;
/// Protocol errors.
pub mod error;
/// Inbound frame decoding.
pub mod frame;
/// Roast program profiles.
pub mod program;

pub use command::{LifecycleCommand, Parameter};
pub use envelope::{OutboundEnvelope, ParameterValue};
pub use error::{coercion_error, DecodeError, ProtocolError};
pub use frame::{decode_frame, InboundFrame, StatusDelta};
pub use program::{ProgramProfile, ProgramStep};
