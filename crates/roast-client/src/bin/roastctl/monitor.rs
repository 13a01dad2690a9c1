//! Line-oriented status stream for scripts and logs.

use roast_client::{ClientConfig, RunTransition, Session, SessionUpdate, StatusReconciler};
use tracing::debug;

use crate::style;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MonitorLine {
    Out(String),
    Warn(String),
    Error(String),
}

pub fn run_monitor(config: &ClientConfig, samples: bool) -> anyhow::Result<()> {
    let mut session = Session::connect(&config.connection)?;
    eprintln!(
        "{}",
        style::note(format!("connected to {}", config.connection.url))
    );
    while !session.is_closed() {
        let Some(update) = session.poll() else {
            continue;
        };
        for line in describe_update(session.reconciler(), &update, samples) {
            match line {
                MonitorLine::Out(text) => println!("{text}"),
                MonitorLine::Warn(text) => eprintln!("{}", style::warning(text)),
                MonitorLine::Error(text) => eprintln!("{}", style::error(text)),
            }
        }
    }
    Ok(())
}

fn describe_update(
    reconciler: &StatusReconciler,
    update: &SessionUpdate,
    samples: bool,
) -> Vec<MonitorLine> {
    match update {
        SessionUpdate::Opened => Vec::new(),
        SessionUpdate::Status(outcome) => {
            let mut lines: Vec<MonitorLine> = outcome
                .changed
                .iter()
                .map(|field| {
                    MonitorLine::Out(format!("{field}={}", reconciler.display_field(field)))
                })
                .collect();
            lines.extend(
                outcome
                    .errors
                    .iter()
                    .map(|err| MonitorLine::Warn(format!("status: {err}"))),
            );
            match outcome.transition {
                Some(RunTransition::LeftOff) => {
                    lines.push(MonitorLine::Out("-- run started".to_string()));
                }
                Some(RunTransition::EnteredOff) => {
                    lines.push(MonitorLine::Out("-- run ended".to_string()));
                }
                None => {}
            }
            lines
        }
        SessionUpdate::Sample(sample) if samples => vec![MonitorLine::Out(format!(
            "sample t={} setpoint={} output={} temperature={}",
            sample.timestamp, sample.setpoint, sample.output, sample.temperature
        ))],
        SessionUpdate::Sample(_) => Vec::new(),
        SessionUpdate::SampleRejected(err) => vec![MonitorLine::Warn(format!("data: {err}"))],
        SessionUpdate::Ignored(reason) => {
            debug!(%reason, "frame ignored");
            Vec::new()
        }
        SessionUpdate::TransportError(message) => {
            vec![MonitorLine::Error(format!("transport: {message}"))]
        }
        SessionUpdate::Closed => vec![MonitorLine::Warn("connection closed".to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roast_client::TelemetrySample;
    use roast_protocol::{decode_frame, InboundFrame};

    fn apply(reconciler: &mut StatusReconciler, raw: &str) -> SessionUpdate {
        let InboundFrame::Status(delta) = decode_frame(raw) else {
            panic!("expected status frame");
        };
        SessionUpdate::Status(reconciler.apply_delta(&delta))
    }

    #[test]
    fn status_lines_follow_changed_fields() {
        let mut reconciler = StatusReconciler::new();
        let update = apply(
            &mut reconciler,
            r#"{"type":"status","data":{"setpoint":205,"state":3,"p":"x"}}"#,
        );
        let lines = describe_update(&reconciler, &update, false);
        assert_eq!(
            lines,
            vec![
                MonitorLine::Out("state=RAMPING".to_string()),
                MonitorLine::Out("setpoint=205".to_string()),
                MonitorLine::Warn(
                    "status: invalid value for 'p': expected number, got \"x\"".to_string()
                ),
                MonitorLine::Out("-- run started".to_string()),
            ]
        );
    }

    #[test]
    fn samples_are_printed_only_when_requested() {
        let reconciler = StatusReconciler::new();
        let update = SessionUpdate::Sample(TelemetrySample {
            timestamp: 1500,
            setpoint: 200.0,
            output: 42.5,
            temperature: 180.25,
        });
        assert!(describe_update(&reconciler, &update, false).is_empty());
        assert_eq!(
            describe_update(&reconciler, &update, true),
            vec![MonitorLine::Out(
                "sample t=1500 setpoint=200 output=42.5 temperature=180.25".to_string()
            )]
        );
    }
}
