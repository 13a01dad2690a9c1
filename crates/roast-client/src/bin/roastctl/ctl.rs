//! One-shot control commands: connect, send one envelope, report the echo.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use roast_client::{
    build_parameter_change, build_program_upload, ClientConfig, ProgramMode, Session,
    SessionUpdate, StatusField, StatusReconciler, WsTransport,
};
use roast_protocol::{LifecycleCommand, OutboundEnvelope, ProgramProfile};
use tracing::{debug, warn};

use crate::style;

/// The controller pushes a full snapshot right after the handshake.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(3);
const ECHO_TIMEOUT: Duration = Duration::from_secs(2);

const STATUS_FIELDS: [StatusField; 10] = [
    StatusField::State,
    StatusField::ProgramMode,
    StatusField::Temperature,
    StatusField::Setpoint,
    StatusField::RampRate,
    StatusField::DutyCycle,
    StatusField::P,
    StatusField::I,
    StatusField::D,
    StatusField::Filename,
];

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Command(LifecycleCommand),
    Mode(ProgramMode),
    Set { name: String, value: String },
    Upload(PathBuf),
}

pub fn run_status(config: &ClientConfig) -> anyhow::Result<()> {
    let mut session = Session::connect(&config.connection)?;
    if !wait_for_snapshot(&mut session) {
        anyhow::bail!("no status received from {}", config.connection.url);
    }
    for line in state_lines(session.reconciler()) {
        println!("{line}");
    }
    close(&mut session)
}

pub fn run_action(config: &ClientConfig, action: Action) -> anyhow::Result<()> {
    // Bad input should fail before any connection is made.
    let envelope = build_envelope(action)?;
    let mut session = Session::connect(&config.connection)?;
    if !wait_for_snapshot(&mut session) {
        eprintln!("{}", style::warning("Warning: no status snapshot received"));
    }
    let sent = session.send_envelope(envelope)?;
    println!("{} {}", style::success("sent"), sent.envelope.encode());
    if wait_for_status(&mut session, ECHO_TIMEOUT) {
        for line in state_lines(session.reconciler()) {
            println!("{line}");
        }
    } else {
        eprintln!(
            "{}",
            style::warning(format!(
                "Warning: controller did not echo a status within {}s",
                ECHO_TIMEOUT.as_secs()
            ))
        );
    }
    close(&mut session)
}

fn build_envelope(action: Action) -> anyhow::Result<OutboundEnvelope> {
    let envelope = match action {
        Action::Command(command) => OutboundEnvelope::command(command),
        Action::Mode(mode) => OutboundEnvelope::command(mode.command()),
        Action::Set { name, value } => build_parameter_change(&name, value)?,
        Action::Upload(path) => {
            let profile = ProgramProfile::load(&path)?;
            debug!(program = %profile.name, steps = profile.steps.len(), "loaded program");
            build_program_upload(profile)?
        }
    };
    Ok(envelope)
}

/// The handshake snapshot may already have been routed by an earlier poll.
fn wait_for_snapshot(session: &mut Session<WsTransport>) -> bool {
    session.has_status() || wait_for_status(session, SNAPSHOT_TIMEOUT)
}

/// Polls until a status frame arrives. `false` on timeout or close.
fn wait_for_status(session: &mut Session<WsTransport>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline && !session.is_closed() {
        match session.poll() {
            Some(SessionUpdate::Status(_)) => return true,
            Some(SessionUpdate::TransportError(message)) => warn!(%message, "transport error"),
            Some(SessionUpdate::Closed) => return false,
            Some(_) | None => {}
        }
    }
    false
}

fn state_lines(reconciler: &StatusReconciler) -> Vec<String> {
    let known = STATUS_FIELDS.iter().cloned();
    let extra = reconciler
        .overflow()
        .keys()
        .map(|key| StatusField::Other(key.clone()));
    known
        .chain(extra)
        .map(|field| format!("{field}={}", reconciler.display_field(&field)))
        .collect()
}

fn close(session: &mut Session<WsTransport>) -> anyhow::Result<()> {
    if !session.is_closed() {
        session.close()?;
    }
    Ok(())
}
