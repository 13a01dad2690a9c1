//! Builds outbound envelopes from user intent. No I/O, no local state.

use roast_protocol::{
    LifecycleCommand, OutboundEnvelope, Parameter, ParameterValue, ProgramProfile, ProtocolError,
};
use serde_json::Value;
use smol_str::SmolStr;

/// Raw parameter value as typed by the user or produced by a widget.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterInput {
    Text(String),
    Number(f64),
}

impl From<&str> for ParameterInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for ParameterInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ParameterInput {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

pub fn build_lifecycle_command(name: &str) -> Result<OutboundEnvelope, ProtocolError> {
    LifecycleCommand::parse(name).map(OutboundEnvelope::command)
}

/// Builds `{"parameters":{name:value}}`. Integral values stay integers.
pub fn build_parameter_change(
    name: &str,
    raw: impl Into<ParameterInput>,
) -> Result<OutboundEnvelope, ProtocolError> {
    let parameter = Parameter::parse(name)?;
    let value = coerce_parameter(parameter, &raw.into())?;
    Ok(OutboundEnvelope::parameter(parameter, value))
}

pub fn build_program_upload(profile: ProgramProfile) -> Result<OutboundEnvelope, ProtocolError> {
    profile.validate()?;
    Ok(OutboundEnvelope::UploadProgram(profile))
}

fn coerce_parameter(
    parameter: Parameter,
    input: &ParameterInput,
) -> Result<ParameterValue, ProtocolError> {
    let value = match input {
        ParameterInput::Text(text) => ParameterValue::parse(text),
        ParameterInput::Number(number) => ParameterValue::from_f64(*number),
    };
    value.ok_or_else(|| {
        let found = match input {
            ParameterInput::Text(text) => Value::String(text.clone()).to_string(),
            ParameterInput::Number(number) => number.to_string(),
        };
        ProtocolError::FieldCoercion {
            field: SmolStr::new_inline(parameter.as_str()),
            expected: "number",
            found: SmolStr::new(found),
        }
    })
}
