//! Closed vocabularies for outbound messages.

use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;

use crate::error::ProtocolError;

/// Zero-argument lifecycle verbs accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleCommand {
    Start,
    Stop,
    Restart,
    SaveConfig,
    ProgramMode,
    SimpleMode,
}

impl LifecycleCommand {
    pub const ALL: [Self; 6] = [
        Self::Start,
        Self::Stop,
        Self::Restart,
        Self::SaveConfig,
        Self::ProgramMode,
        Self::SimpleMode,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::SaveConfig => "saveConfig",
            Self::ProgramMode => "program_mode",
            Self::SimpleMode => "simple_mode",
        }
    }

    /// Looks up a command by its wire name.
    pub fn parse(name: &str) -> Result<Self, ProtocolError> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|command| command.as_str() == name)
            .ok_or_else(|| ProtocolError::InvalidCommand(SmolStr::new(name)))
    }

    /// Whether issuing this command starts a fresh chart.
    #[must_use]
    pub fn starts_run(self) -> bool {
        matches!(
            self,
            Self::Start | Self::Restart | Self::ProgramMode | Self::SimpleMode
        )
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Tunable controller parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Setpoint,
    RampRate,
    P,
    I,
    D,
}

impl Parameter {
    pub const ALL: [Self; 5] = [Self::Setpoint, Self::RampRate, Self::P, Self::I, Self::D];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setpoint => "setpoint",
            Self::RampRate => "ramp_rate",
            Self::P => "p",
            Self::I => "i",
            Self::D => "d",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ProtocolError> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|parameter| parameter.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ProtocolError::UnknownParameter(SmolStr::new(name)))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
