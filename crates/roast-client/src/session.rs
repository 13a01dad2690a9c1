//! Session controller: owns the transport handle, routes inbound frames to
//! the status mirror or the telemetry store, and sends user intent.

use roast_protocol::{
    decode_frame, DecodeError, InboundFrame, LifecycleCommand, OutboundEnvelope, ProgramProfile,
    ProtocolError,
};
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::dispatch::{self, ParameterInput};
use crate::error::ClientError;
use crate::series::{TelemetrySample, TelemetrySeries};
use crate::state::{ControllerState, DeltaOutcome, ProgramMode, StatusReconciler};

/// Outbound half of a connection.
pub trait Transport {
    fn send(&mut self, text: &str) -> Result<(), ClientError>;
    fn close(&mut self) -> Result<(), ClientError>;
}

/// Inbound half of a connection, as delivered by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// What handling one transport event did.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Opened,
    Status(DeltaOutcome),
    Sample(TelemetrySample),
    SampleRejected(ProtocolError),
    Ignored(DecodeError),
    TransportError(SmolStr),
    /// Terminal. No further updates follow.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Open,
    Closed,
}

/// Receipt for an envelope handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub envelope: OutboundEnvelope,
    /// The telemetry series were cleared before sending.
    pub run_reset: bool,
}

/// One connection's worth of client state.
///
/// Nothing is applied optimistically: actions only send intent and the
/// mirror changes when the controller's status echo arrives.
pub struct Session<T> {
    transport: T,
    phase: SessionPhase,
    reconciler: StatusReconciler,
    series: TelemetrySeries,
    has_status: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            phase: SessionPhase::Connecting,
            reconciler: StatusReconciler::new(),
            series: TelemetrySeries::new(),
            has_status: false,
        }
    }

    /// Routes one transport event. Returns `None` once the session is closed.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<SessionUpdate> {
        if self.phase == SessionPhase::Closed {
            return None;
        }
        let update = match event {
            TransportEvent::Opened => {
                info!("session open");
                self.phase = SessionPhase::Open;
                SessionUpdate::Opened
            }
            TransportEvent::Message(text) => self.route_frame(&text),
            TransportEvent::Error(message) => {
                warn!(error = %message, "transport error");
                SessionUpdate::TransportError(SmolStr::new(message))
            }
            TransportEvent::Closed => {
                info!("session closed");
                self.phase = SessionPhase::Closed;
                SessionUpdate::Closed
            }
        };
        Some(update)
    }

    /// Classifies a raw frame and hands it to the component that owns it.
    pub fn route_frame(&mut self, raw: &str) -> SessionUpdate {
        match decode_frame(raw) {
            InboundFrame::Status(delta) => {
                self.has_status = true;
                SessionUpdate::Status(self.reconciler.apply_delta(&delta))
            }
            InboundFrame::Data(record) => match self.series.ingest(&record) {
                Ok(sample) => SessionUpdate::Sample(sample),
                Err(err) => {
                    warn!(error = %err, "telemetry sample dropped");
                    SessionUpdate::SampleRejected(err)
                }
            },
            InboundFrame::Unrecognized { raw, reason } => {
                debug!(frame = %raw, reason = %reason, "frame ignored");
                SessionUpdate::Ignored(reason)
            }
        }
    }

    pub fn start(&mut self) -> Result<Sent, ClientError> {
        self.send_envelope(OutboundEnvelope::command(LifecycleCommand::Start))
    }

    /// Sends `stop`. The chart of the finished run stays on screen.
    /// Samples that arrive after a stop extend the finished run on its time
    /// axis; only a command that begins a run clears it.
    pub fn stop(&mut self) -> Result<Sent, ClientError> {
        self.send_envelope(OutboundEnvelope::command(LifecycleCommand::Stop))
    }

    pub fn restart(&mut self) -> Result<Sent, ClientError> {
        self.send_envelope(OutboundEnvelope::command(LifecycleCommand::Restart))
    }

    pub fn save_config(&mut self) -> Result<Sent, ClientError> {
        self.send_envelope(OutboundEnvelope::command(LifecycleCommand::SaveConfig))
    }

    pub fn switch_mode(&mut self, mode: ProgramMode) -> Result<Sent, ClientError> {
        self.send_envelope(OutboundEnvelope::command(mode.command()))
    }

    /// Stops an active run, otherwise starts one.
    pub fn toggle_run(&mut self) -> Result<Sent, ClientError> {
        if self.reconciler.is_run_active() {
            self.stop()
        } else {
            self.start()
        }
    }

    /// Sends a lifecycle command by wire name.
    pub fn send_command(&mut self, name: &str) -> Result<Sent, ClientError> {
        self.ensure_usable()?;
        let envelope = dispatch::build_lifecycle_command(name)?;
        self.send_envelope(envelope)
    }

    pub fn set_parameter(
        &mut self,
        name: &str,
        value: impl Into<ParameterInput>,
    ) -> Result<Sent, ClientError> {
        self.ensure_usable()?;
        let envelope = dispatch::build_parameter_change(name, value)?;
        self.send_envelope(envelope)
    }

    pub fn upload_program(&mut self, profile: ProgramProfile) -> Result<Sent, ClientError> {
        self.ensure_usable()?;
        let envelope = dispatch::build_program_upload(profile)?;
        self.send_envelope(envelope)
    }

    /// Sends an already built envelope. Commands that begin a run clear the
    /// telemetry series first.
    pub fn send_envelope(&mut self, envelope: OutboundEnvelope) -> Result<Sent, ClientError> {
        self.ensure_usable()?;
        let run_reset = match &envelope {
            OutboundEnvelope::Commands(commands) => commands.iter().any(|cmd| cmd.starts_run()),
            OutboundEnvelope::Parameters(_) | OutboundEnvelope::UploadProgram(_) => false,
        };
        if run_reset {
            self.series.reset();
        }
        let text = envelope.encode();
        debug!(message = %text, "send");
        self.transport.send(&text)?;
        Ok(Sent {
            envelope,
            run_reset,
        })
    }

    /// Closes the transport and ends the session.
    pub fn close(&mut self) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::SessionClosed);
        }
        self.phase = SessionPhase::Closed;
        self.transport.close()
    }

    /// Sends are accepted only while the connection is open.
    fn ensure_usable(&self) -> Result<(), ClientError> {
        match self.phase {
            SessionPhase::Open => Ok(()),
            SessionPhase::Connecting => Err(ClientError::NotConnected),
            SessionPhase::Closed => Err(ClientError::SessionClosed),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Whether at least one status frame has been mirrored. Until then every
    /// field of [`Session::state`] is unknown rather than known-empty.
    pub fn has_status(&self) -> bool {
        self.has_status
    }

    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    pub fn state(&self) -> &ControllerState {
        self.reconciler.state()
    }

    pub fn series(&self) -> &TelemetrySeries {
        &self.series
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
