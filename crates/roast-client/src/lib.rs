//! `roast-client` - client engine for the roast controller.
//!
//! A [`Session`] owns one connection and routes what arrives on it: status
//! deltas go to the [`StatusReconciler`], telemetry records to the
//! [`TelemetrySeries`]. User intent is turned into envelopes by the
//! [`dispatch`] functions and sent without touching local state; the mirror
//! changes only when the controller echoes its status back.

#![forbid(unsafe_code)]

/// Client configuration.
pub mod config;
/// Terminal console.
pub mod console;
/// Outbound envelope builders.
pub mod dispatch;
/// Client errors.
pub mod error;
/// Telemetry series store.
pub mod series;
/// Session controller.
pub mod session;
/// Status mirror.
pub mod state;
/// WebSocket transport.
pub mod transport;

pub use config::{ClientConfig, ConnectionConfig, ConsoleConfig};
pub use dispatch::{
    build_lifecycle_command, build_parameter_change, build_program_upload, ParameterInput,
};
pub use error::ClientError;
pub use series::{SeriesKind, SeriesPoint, TelemetrySample, TelemetrySeries};
pub use session::{Sent, Session, SessionPhase, SessionUpdate, Transport, TransportEvent};
pub use state::{
    ControllerState, DeltaOutcome, ProgramMode, RunState, RunTransition, StatusField,
    StatusReconciler,
};
pub use transport::WsTransport;
