//! Mirrored controller state, built only from partial status deltas.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use roast_protocol::{coercion_error, LifecycleCommand, ProtocolError, StatusDelta};
use serde_json::Value;
use smol_str::SmolStr;
use tracing::debug;

/// Controller run state, reported on the wire as an index into this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Off,
    Preheating,
    Preheat,
    Ramping,
    Hold,
    Cooling,
}

impl RunState {
    pub const ALL: [Self; 6] = [
        Self::Off,
        Self::Preheating,
        Self::Preheat,
        Self::Ramping,
        Self::Hold,
        Self::Cooling,
    ];

    #[must_use]
    pub fn from_index(index: u64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Preheating => "PREHEATING",
            Self::Preheat => "PREHEAT",
            Self::Ramping => "RAMPING",
            Self::Hold => "HOLD",
            Self::Cooling => "COOLING",
        }
    }

    #[must_use]
    pub fn is_off(self) -> bool {
        matches!(self, Self::Off)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control mode, reported as an index into `[SIMPLE, PROGRAM]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramMode {
    Simple,
    Program,
}

impl ProgramMode {
    #[must_use]
    pub fn from_index(index: u64) -> Option<Self> {
        match index {
            0 => Some(Self::Simple),
            1 => Some(Self::Program),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::Program => "PROGRAM",
        }
    }

    /// Lifecycle command that switches the controller into this mode.
    #[must_use]
    pub fn command(self) -> LifecycleCommand {
        match self {
            Self::Simple => LifecycleCommand::SimpleMode,
            Self::Program => LifecycleCommand::ProgramMode,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "simple" | "simple_mode" => Some(Self::Simple),
            "program" | "program_mode" => Some(Self::Program),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local mirror of the controller. Every field stays absent until the
/// server reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub run_state: Option<RunState>,
    pub temperature: Option<f64>,
    pub setpoint: Option<f64>,
    pub ramp_rate: Option<f64>,
    pub duty_cycle: Option<f64>,
    pub p: Option<f64>,
    pub i: Option<f64>,
    pub d: Option<f64>,
    pub filename: Option<String>,
    pub program_mode: Option<ProgramMode>,
}

/// Name of a status field touched by a delta.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusField {
    State,
    Temperature,
    Setpoint,
    RampRate,
    DutyCycle,
    P,
    I,
    D,
    Filename,
    ProgramMode,
    /// Key outside the known set, kept in the overflow bag.
    Other(SmolStr),
}

impl StatusField {
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "state" => Self::State,
            "temperature" => Self::Temperature,
            "setpoint" => Self::Setpoint,
            "ramp_rate" => Self::RampRate,
            "duty_cycle" | "output" => Self::DutyCycle,
            "p" => Self::P,
            "i" => Self::I,
            "d" => Self::D,
            "filename" => Self::Filename,
            "programMode" => Self::ProgramMode,
            other => Self::Other(SmolStr::new(other)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::State => "state",
            Self::Temperature => "temperature",
            Self::Setpoint => "setpoint",
            Self::RampRate => "ramp_rate",
            Self::DutyCycle => "duty_cycle",
            Self::P => "p",
            Self::I => "i",
            Self::D => "d",
            Self::Filename => "filename",
            Self::ProgramMode => "programMode",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for StatusField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crossing of the OFF boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTransition {
    EnteredOff,
    LeftOff,
}

/// What one delta did to the mirror.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaOutcome {
    pub changed: BTreeSet<StatusField>,
    /// Fields that could not be applied. Their siblings were still applied.
    pub errors: Vec<ProtocolError>,
    pub transition: Option<RunTransition>,
}

impl DeltaOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.errors.is_empty() && self.transition.is_none()
    }

    #[must_use]
    pub fn touched(&self, field: &StatusField) -> bool {
        self.changed.contains(field)
    }
}

/// Owns the [`ControllerState`] mirror and applies status deltas to it.
#[derive(Debug, Clone, Default)]
pub struct StatusReconciler {
    state: ControllerState,
    previous_run_state: Option<RunState>,
    overflow: IndexMap<SmolStr, Value>,
}

impl StatusReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a partial update. Keys absent from `delta` keep their value;
    /// every present key counts as changed even if the value is the same.
    pub fn apply_delta(&mut self, delta: &StatusDelta) -> DeltaOutcome {
        let before = self.state.run_state;
        let mut outcome = DeltaOutcome::default();
        for (key, value) in delta {
            let field = StatusField::from_key(key);
            match self.apply_field(&field, key, value) {
                Ok(()) => {
                    outcome.changed.insert(field);
                }
                Err(err) => {
                    debug!(field = %key, error = %err, "status field rejected");
                    outcome.errors.push(err);
                }
            }
        }
        let after = self.state.run_state;
        if after != before {
            self.previous_run_state = before;
            outcome.transition = transition(before, after);
        }
        outcome
    }

    fn apply_field(
        &mut self,
        field: &StatusField,
        key: &str,
        value: &Value,
    ) -> Result<(), ProtocolError> {
        match field {
            StatusField::State => {
                self.state.run_state =
                    coerce_index(key, value, "run state index 0..=5", RunState::from_index)?;
            }
            StatusField::ProgramMode => {
                self.state.program_mode = coerce_index(
                    key,
                    value,
                    "program mode index 0..=1",
                    ProgramMode::from_index,
                )?;
            }
            StatusField::Temperature => self.state.temperature = coerce_number(key, value)?,
            StatusField::Setpoint => self.state.setpoint = coerce_number(key, value)?,
            StatusField::RampRate => self.state.ramp_rate = coerce_number(key, value)?,
            StatusField::DutyCycle => self.state.duty_cycle = coerce_number(key, value)?,
            StatusField::P => self.state.p = coerce_number(key, value)?,
            StatusField::I => self.state.i = coerce_number(key, value)?,
            StatusField::D => self.state.d = coerce_number(key, value)?,
            StatusField::Filename => {
                self.state.filename = match value {
                    Value::Null => None,
                    Value::String(name) => Some(name.clone()),
                    other => return Err(coercion_error(key, "string", other)),
                };
            }
            StatusField::Other(name) => {
                self.overflow.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    #[must_use]
    pub fn snapshot(&self) -> ControllerState {
        self.state.clone()
    }

    #[must_use]
    pub fn run_state(&self) -> Option<RunState> {
        self.state.run_state
    }

    /// Run state before the most recent change of run state.
    #[must_use]
    pub fn previous_run_state(&self) -> Option<RunState> {
        self.previous_run_state
    }

    /// Status keys outside the known field set, verbatim.
    #[must_use]
    pub fn overflow(&self) -> &IndexMap<SmolStr, Value> {
        &self.overflow
    }

    #[must_use]
    pub fn is_run_active(&self) -> bool {
        self.state.run_state.is_some_and(|state| !state.is_off())
    }

    /// Current value of `field` for display; `-` when absent.
    #[must_use]
    pub fn display_field(&self, field: &StatusField) -> String {
        fn number(value: Option<f64>) -> String {
            value.map_or_else(|| "-".to_string(), |value| value.to_string())
        }
        let state = &self.state;
        match field {
            StatusField::State => state.run_state.map_or("-", RunState::as_str).to_string(),
            StatusField::ProgramMode => state
                .program_mode
                .map_or("-", ProgramMode::as_str)
                .to_string(),
            StatusField::Temperature => number(state.temperature),
            StatusField::Setpoint => number(state.setpoint),
            StatusField::RampRate => number(state.ramp_rate),
            StatusField::DutyCycle => number(state.duty_cycle),
            StatusField::P => number(state.p),
            StatusField::I => number(state.i),
            StatusField::D => number(state.d),
            StatusField::Filename => state.filename.clone().unwrap_or_else(|| "-".to_string()),
            StatusField::Other(name) => self
                .overflow
                .get(name)
                .map_or_else(|| "-".to_string(), ToString::to_string),
        }
    }
}

fn transition(before: Option<RunState>, after: Option<RunState>) -> Option<RunTransition> {
    let after = after?;
    // Unknown prior state counts as the other side of the boundary.
    let was_off = before.map_or(!after.is_off(), RunState::is_off);
    match (was_off, after.is_off()) {
        (false, true) => Some(RunTransition::EnteredOff),
        (true, false) => Some(RunTransition::LeftOff),
        _ => None,
    }
}

fn coerce_number(key: &str, value: &Value) -> Result<Option<f64>, ProtocolError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_f64()
            .filter(|value| value.is_finite())
            .map(Some)
            .ok_or_else(|| coercion_error(key, "number", value)),
        other => Err(coercion_error(key, "number", other)),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coerce_index<T>(
    key: &str,
    value: &Value,
    expected: &'static str,
    lookup: impl Fn(u64) -> Option<T>,
) -> Result<Option<T>, ProtocolError> {
    let Value::Number(number) = value else {
        if value.is_null() {
            return Ok(None);
        }
        return Err(coercion_error(key, expected, value));
    };
    // The controller reports indices through a double-valued table.
    let index = number.as_u64().or_else(|| {
        number
            .as_f64()
            .filter(|float| *float >= 0.0 && float.fract() == 0.0 && *float <= 255.0)
            .map(|float| float as u64)
    });
    index
        .and_then(lookup)
        .map(Some)
        .ok_or_else(|| coercion_error(key, expected, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(value: Value) -> StatusDelta {
        serde_json::from_value(value).expect("delta object")
    }

    #[test]
    fn empty_delta_changes_nothing() {
        let mut reconciler = StatusReconciler::new();
        reconciler.apply_delta(&delta(json!({"p": 5})));
        let before = reconciler.snapshot();
        let outcome = reconciler.apply_delta(&StatusDelta::new());
        assert!(outcome.is_empty());
        assert_eq!(reconciler.snapshot(), before);
    }

    #[test]
    fn deltas_accumulate_field_by_field() {
        let mut reconciler = StatusReconciler::new();
        reconciler.apply_delta(&delta(json!({"p": 5})));
        let outcome = reconciler.apply_delta(&delta(json!({"i": 2})));
        let state = reconciler.state();
        assert_eq!(state.p, Some(5.0));
        assert_eq!(state.i, Some(2.0));
        assert_eq!(state.d, None);
        assert_eq!(state.temperature, None);
        assert_eq!(outcome.changed, BTreeSet::from([StatusField::I]));
    }

    #[test]
    fn output_is_an_alias_of_duty_cycle() {
        let mut reconciler = StatusReconciler::new();
        let outcome = reconciler.apply_delta(&delta(json!({"output": 42.5})));
        assert_eq!(reconciler.state().duty_cycle, Some(42.5));
        assert!(outcome.touched(&StatusField::DutyCycle));
    }

    #[test]
    fn malformed_field_does_not_block_siblings() {
        let mut reconciler = StatusReconciler::new();
        let outcome = reconciler.apply_delta(&delta(json!({
            "temperature": "hot",
            "setpoint": 210,
            "state": 9,
        })));
        assert_eq!(reconciler.state().setpoint, Some(210.0));
        assert_eq!(reconciler.state().temperature, None);
        assert_eq!(reconciler.run_state(), None);
        assert_eq!(outcome.changed, BTreeSet::from([StatusField::Setpoint]));
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome
            .errors
            .iter()
            .all(|err| matches!(err, ProtocolError::FieldCoercion { .. })));
    }

    #[test]
    fn null_clears_a_field() {
        let mut reconciler = StatusReconciler::new();
        reconciler.apply_delta(&delta(json!({"filename": "roast-01.csv", "d": 1})));
        let outcome = reconciler.apply_delta(&delta(json!({"filename": null})));
        assert_eq!(reconciler.state().filename, None);
        assert_eq!(reconciler.state().d, Some(1.0));
        assert!(outcome.touched(&StatusField::Filename));
    }

    #[test]
    fn indices_accept_integral_floats() {
        let mut reconciler = StatusReconciler::new();
        let outcome = reconciler.apply_delta(&delta(json!({"state": 3.0, "programMode": 1.0})));
        assert!(outcome.errors.is_empty());
        assert_eq!(reconciler.run_state(), Some(RunState::Ramping));
        assert_eq!(reconciler.state().program_mode, Some(ProgramMode::Program));
        let outcome = reconciler.apply_delta(&delta(json!({"state": 1.5})));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(reconciler.run_state(), Some(RunState::Ramping));
    }

    #[test]
    fn numeric_strings_are_not_coerced() {
        let mut reconciler = StatusReconciler::new();
        let outcome = reconciler.apply_delta(&delta(json!({"setpoint": "125"})));
        assert_eq!(reconciler.state().setpoint, None);
        assert_eq!(
            outcome.errors[0].to_string(),
            r#"invalid value for 'setpoint': expected number, got "125""#
        );
    }

    #[test]
    fn unknown_keys_go_to_overflow() {
        let mut reconciler = StatusReconciler::new();
        let outcome = reconciler.apply_delta(&delta(json!({"fan": 3, "p": 1})));
        assert_eq!(reconciler.overflow().get("fan"), Some(&json!(3)));
        assert!(outcome.touched(&StatusField::Other("fan".into())));
        assert_eq!(reconciler.state().p, Some(1.0));
    }

    #[test]
    fn run_transitions_distinguish_entering_and_leaving_off() {
        let mut reconciler = StatusReconciler::new();
        let outcome = reconciler.apply_delta(&delta(json!({"state": 0})));
        assert_eq!(outcome.transition, Some(RunTransition::EnteredOff));

        let outcome = reconciler.apply_delta(&delta(json!({"state": 1})));
        assert_eq!(outcome.transition, Some(RunTransition::LeftOff));
        assert_eq!(reconciler.previous_run_state(), Some(RunState::Off));
        assert!(reconciler.is_run_active());

        let outcome = reconciler.apply_delta(&delta(json!({"state": 3})));
        assert_eq!(outcome.transition, None);
        assert_eq!(reconciler.previous_run_state(), Some(RunState::Preheating));

        // Same value again: reported as changed, previous state kept.
        let outcome = reconciler.apply_delta(&delta(json!({"state": 3})));
        assert!(outcome.touched(&StatusField::State));
        assert_eq!(reconciler.previous_run_state(), Some(RunState::Preheating));

        let outcome = reconciler.apply_delta(&delta(json!({"state": 5})));
        assert_eq!(outcome.transition, None);
        let outcome = reconciler.apply_delta(&delta(json!({"state": 0})));
        assert_eq!(outcome.transition, Some(RunTransition::EnteredOff));
        assert_eq!(reconciler.previous_run_state(), Some(RunState::Cooling));
        assert!(!reconciler.is_run_active());
    }

    #[test]
    fn first_active_report_counts_as_leaving_off() {
        let mut reconciler = StatusReconciler::new();
        let outcome = reconciler.apply_delta(&delta(json!({"state": 4})));
        assert_eq!(outcome.transition, Some(RunTransition::LeftOff));
        assert_eq!(reconciler.previous_run_state(), None);
    }

    #[test]
    fn display_field_renders_current_values() {
        let mut reconciler = StatusReconciler::new();
        let fields = json!({"state": 4, "temperature": 201.5, "fan": "high"});
        reconciler.apply_delta(&delta(fields));
        assert_eq!(reconciler.display_field(&StatusField::State), "HOLD");
        assert_eq!(reconciler.display_field(&StatusField::Temperature), "201.5");
        assert_eq!(reconciler.display_field(&StatusField::Setpoint), "-");
        assert_eq!(
            reconciler.display_field(&StatusField::Other("fan".into())),
            r#""high""#
        );
    }

    #[test]
    fn program_mode_maps_to_switch_command() {
        assert_eq!(ProgramMode::Simple.command(), LifecycleCommand::SimpleMode);
        assert_eq!(ProgramMode::parse("Program"), Some(ProgramMode::Program));
        assert_eq!(ProgramMode::parse("auto"), None);
    }
}
