//! Outbound message envelopes.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value};
use smol_str::SmolStr;

use crate::command::{LifecycleCommand, Parameter};
use crate::error::{coercion_error, DecodeError, ProtocolError};
use crate::program::ProgramProfile;

pub const UPLOAD_PROGRAM_COMMAND: &str = "upload_program";

/// Numeric parameter value. Integral inputs stay integers on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Integer(i64),
    Float(f64),
}

impl ParameterValue {
    /// Parses user text such as `"125"` or `"0.5"`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(integer) = text.parse::<i64>() {
            return Some(Self::Integer(integer));
        }
        text.parse::<f64>().ok().and_then(Self::from_f64)
    }

    /// Rejects non-finite numbers; collapses integral floats to integers.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            return Some(Self::Integer(value as i64));
        }
        Some(Self::Float(value))
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    fn to_json(self) -> Value {
        match self {
            Self::Integer(value) => json!(value),
            Self::Float(value) => json!(value),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().and_then(Self::from_f64)),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Client to controller message.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEnvelope {
    /// `{"commands":[...]}`
    Commands(Vec<LifecycleCommand>),
    /// `{"parameters":{...}}`
    Parameters(BTreeMap<Parameter, ParameterValue>),
    /// `{"command":"upload_program","data":{...}}`
    UploadProgram(ProgramProfile),
}

impl OutboundEnvelope {
    #[must_use]
    pub fn command(command: LifecycleCommand) -> Self {
        Self::Commands(vec![command])
    }

    #[must_use]
    pub fn parameter(parameter: Parameter, value: ParameterValue) -> Self {
        Self::Parameters(BTreeMap::from([(parameter, value)]))
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Commands(commands) => json!({
                "commands": commands.iter().map(|command| command.as_str()).collect::<Vec<_>>(),
            }),
            Self::Parameters(parameters) => {
                let map = parameters
                    .iter()
                    .map(|(parameter, value)| (parameter.as_str().to_string(), value.to_json()))
                    .collect::<Map<_, _>>();
                json!({ "parameters": map })
            }
            Self::UploadProgram(profile) => json!({
                "command": UPLOAD_PROGRAM_COMMAND,
                "data": profile.to_value(),
            }),
        }
    }

    /// Compact JSON text as sent on the wire.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    /// Parses an outbound envelope, as the controller side reads it.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| DecodeError::InvalidJson(SmolStr::new(err.to_string())))?;
        let Value::Object(object) = value else {
            return Err(DecodeError::NotAnObject.into());
        };
        if let Some(commands) = object.get("commands") {
            return decode_commands(commands);
        }
        if let Some(parameters) = object.get("parameters") {
            return decode_parameters(parameters);
        }
        match object.get("command").and_then(Value::as_str) {
            Some(UPLOAD_PROGRAM_COMMAND) => {
                let data = object.get("data").cloned().unwrap_or(Value::Null);
                let profile = ProgramProfile::from_value(data)?;
                Ok(Self::UploadProgram(profile))
            }
            Some(other) => Err(ProtocolError::InvalidCommand(SmolStr::new(other))),
            None => Err(DecodeError::MissingType.into()),
        }
    }
}

fn decode_commands(value: &Value) -> Result<OutboundEnvelope, ProtocolError> {
    let Some(entries) = value.as_array() else {
        return Err(coercion_error("commands", "array of strings", value));
    };
    let commands = entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| coercion_error("commands", "string", entry))
                .and_then(LifecycleCommand::parse)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OutboundEnvelope::Commands(commands))
}

fn decode_parameters(value: &Value) -> Result<OutboundEnvelope, ProtocolError> {
    let Some(entries) = value.as_object() else {
        return Err(coercion_error("parameters", "object", value));
    };
    let mut parameters = BTreeMap::new();
    for (name, raw) in entries {
        let parameter = Parameter::parse(name)?;
        let value =
            ParameterValue::from_json(raw).ok_or_else(|| coercion_error(name, "number", raw))?;
        parameters.insert(parameter, value);
    }
    Ok(OutboundEnvelope::Parameters(parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramStep;
    use expect_test::expect;

    #[test]
    fn lifecycle_envelope_json() {
        expect![[r#"{"commands":["stop"]}"#]]
            .assert_eq(&OutboundEnvelope::command(LifecycleCommand::Stop).encode());
        expect![[r#"{"commands":["saveConfig"]}"#]]
            .assert_eq(&OutboundEnvelope::command(LifecycleCommand::SaveConfig).encode());
    }

    #[test]
    fn parameter_envelope_keeps_integers_integral() {
        let integral = ParameterValue::parse("125").expect("integer");
        expect![[r#"{"parameters":{"setpoint":125}}"#]]
            .assert_eq(&OutboundEnvelope::parameter(Parameter::Setpoint, integral).encode());
        let fractional = ParameterValue::parse("0.25").expect("float");
        expect![[r#"{"parameters":{"i":0.25}}"#]]
            .assert_eq(&OutboundEnvelope::parameter(Parameter::I, fractional).encode());
    }

    #[test]
    fn parameter_value_parse_rules() {
        let parse = ParameterValue::parse;
        assert_eq!(parse(" 42 "), Some(ParameterValue::Integer(42)));
        assert_eq!(parse("-3"), Some(ParameterValue::Integer(-3)));
        assert_eq!(parse("200.0"), Some(ParameterValue::Integer(200)));
        assert_eq!(parse("1e2"), Some(ParameterValue::Integer(100)));
        assert_eq!(parse("0.5"), Some(ParameterValue::Float(0.5)));
        assert_eq!(parse("abc"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("NaN"), None);
        assert_eq!(parse("inf"), None);
    }

    #[test]
    fn upload_envelope_json() {
        let profile = ProgramProfile {
            name: "city".into(),
            steps: vec![ProgramStep {
                step_name: "dry".into(),
                target_temp: 150.0,
                ramp_rate: 20.5,
                hold_time: 60.0,
            }],
        };
        expect![[r#"{"command":"upload_program","data":{"program_name":"city","program_steps":[{"hold_time":60.0,"ramp_rate":20.5,"step_name":"dry","target_temp":150.0}]}}"#]]
            .assert_eq(&OutboundEnvelope::UploadProgram(profile).encode());
    }

    #[test]
    fn decode_accepts_every_outbound_shape() {
        assert_eq!(
            OutboundEnvelope::decode(r#"{"commands":["start","stop"]}"#),
            Ok(OutboundEnvelope::Commands(vec![
                LifecycleCommand::Start,
                LifecycleCommand::Stop
            ]))
        );
        assert_eq!(
            OutboundEnvelope::decode(r#"{"parameters":{"p":5,"ramp_rate":1.5}}"#),
            Ok(OutboundEnvelope::Parameters(BTreeMap::from([
                (Parameter::RampRate, ParameterValue::Float(1.5)),
                (Parameter::P, ParameterValue::Integer(5)),
            ])))
        );
        let upload = OutboundEnvelope::decode(
            r#"{"command":"upload_program","data":{"program_name":"x","program_steps":[{"step_name":"a","target_temp":1,"ramp_rate":2,"hold_time":3}]}}"#,
        )
        .expect("upload");
        let OutboundEnvelope::UploadProgram(profile) = upload else {
            panic!("upload envelope expected");
        };
        assert_eq!(profile.steps.len(), 1);
    }

    #[test]
    fn decode_rejects_unknown_vocabulary() {
        assert_eq!(
            OutboundEnvelope::decode(r#"{"commands":["launch"]}"#),
            Err(ProtocolError::InvalidCommand("launch".into()))
        );
        assert_eq!(
            OutboundEnvelope::decode(r#"{"parameters":{"fan":1}}"#),
            Err(ProtocolError::UnknownParameter("fan".into()))
        );
        assert!(matches!(
            OutboundEnvelope::decode(r#"{"parameters":{"p":"ten"}}"#),
            Err(ProtocolError::FieldCoercion { .. })
        ));
        assert_eq!(
            OutboundEnvelope::decode(r#"{"command":"format_disk"}"#),
            Err(ProtocolError::InvalidCommand("format_disk".into()))
        );
    }
}
