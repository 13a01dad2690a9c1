//! Roast program profiles (multi-step ramp/hold tables).

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};
use smol_str::SmolStr;

use crate::error::ProtocolError;

/// One ramp-then-hold step of a roast program.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgramStep {
    pub step_name: String,
    pub target_temp: f64,
    pub ramp_rate: f64,
    #[serde(default)]
    pub hold_time: f64,
}

impl ProgramStep {
    fn to_value(&self) -> Value {
        json!({
            "hold_time": self.hold_time,
            "ramp_rate": self.ramp_rate,
            "step_name": self.step_name,
            "target_temp": self.target_temp,
        })
    }
}

/// Named list of steps uploaded with `upload_program`.
///
/// Files may spell the keys as on the wire (`program_name`, `program_steps`)
/// or short (`name`, `steps`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgramProfile {
    #[serde(rename = "program_name", alias = "name")]
    pub name: String,
    #[serde(rename = "program_steps", alias = "steps")]
    pub steps: Vec<ProgramStep>,
}

impl ProgramProfile {
    /// Loads a profile from a `.json` file, or TOML for any other extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            ProtocolError::InvalidProgram(format!("{}: {err}", path.display()).into())
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let profile = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        };
        profile.map_err(|err| match err {
            ProtocolError::InvalidProgram(message) => {
                ProtocolError::InvalidProgram(format!("{}: {message}", path.display()).into())
            }
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ProtocolError> {
        let profile: Self = toml::from_str(text)
            .map_err(|err| ProtocolError::InvalidProgram(SmolStr::new(err.to_string())))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ProtocolError> {
        let profile: Self = serde_json::from_str(text)
            .map_err(|err| ProtocolError::InvalidProgram(SmolStr::new(err.to_string())))?;
        profile.validate()?;
        Ok(profile)
    }

    pub(crate) fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let profile: Self = serde_json::from_value(value)
            .map_err(|err| ProtocolError::InvalidProgram(SmolStr::new(err.to_string())))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Checks the profile is uploadable: a name, at least one step, and
    /// finite numbers with non-negative ramp rates and hold times.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.name.trim().is_empty() {
            return Err(invalid("program name must not be empty"));
        }
        if self.steps.is_empty() {
            return Err(invalid("program needs at least one step"));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.step_name.trim().is_empty() {
                return Err(invalid(format!("step {index} has no name")));
            }
            let numbers = [
                ("target_temp", step.target_temp),
                ("ramp_rate", step.ramp_rate),
                ("hold_time", step.hold_time),
            ];
            for (field, value) in numbers {
                if !value.is_finite() {
                    return Err(invalid(format!(
                        "step '{}' {field} must be a finite number",
                        step.step_name
                    )));
                }
            }
            if step.ramp_rate < 0.0 || step.hold_time < 0.0 {
                return Err(invalid(format!(
                    "step '{}' ramp_rate and hold_time must be >= 0",
                    step.step_name
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "program_name": self.name,
            "program_steps": self.steps.iter().map(ProgramStep::to_value).collect::<Vec<_>>(),
        })
    }
}

fn invalid(message: impl AsRef<str>) -> ProtocolError {
    ProtocolError::InvalidProgram(SmolStr::new(message))
}
