//! Client configuration loading (`roaster.toml`).

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;
use tungstenite::http::Uri;

use crate::error::ClientError;

pub const CONFIG_FILE_NAME: &str = "roaster.toml";
pub const DEFAULT_URL: &str = "ws://127.0.0.1:81/";
pub const DEFAULT_PORT: u16 = 81;
pub const DEFAULT_SUBPROTOCOL: &str = "arduino";
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_REFRESH_MS: u64 = 100;
pub const DEFAULT_CHART_BUCKETS: usize = 240;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub log_level: Option<SmolStr>,
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub url: SmolStr,
    pub subprotocol: SmolStr,
    pub read_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub refresh: Duration,
    pub chart_buckets: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: SmolStr::new_inline(DEFAULT_URL),
            subprotocol: SmolStr::new_inline(DEFAULT_SUBPROTOCOL),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            refresh: Duration::from_millis(DEFAULT_REFRESH_MS),
            chart_buckets: DEFAULT_CHART_BUCKETS,
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| located(path, err))?;
        Self::from_toml_str(&text).map_err(|err| match err {
            ClientError::InvalidConfig(message) => located(path, message),
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ClientError> {
        let raw: ClientToml = toml::from_str(text).map_err(invalid)?;
        raw.into_config()
    }

    /// Loads `explicit` if given, else `roaster.toml` from the working
    /// directory when present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ClientError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::load(local);
        }
        Ok(Self::default())
    }

    pub fn override_url(&mut self, url: &str) -> Result<(), ClientError> {
        self.connection.url = normalize_url(url)?;
        Ok(())
    }
}

/// Canonical `ws://host:port/path` form. A bare host gets the controller's
/// default scheme and port.
pub fn normalize_url(text: &str) -> Result<SmolStr, ClientError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid("connection.url is empty"));
    }
    let full = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("ws://{trimmed}")
    };
    let uri: Uri = full.parse().map_err(|err| invalid_url(trimmed, err))?;
    match uri.scheme_str() {
        Some("ws") => {}
        Some("wss") => return Err(invalid_url(trimmed, "wss:// is not supported")),
        _ => return Err(invalid_url(trimmed, "expected ws:// scheme")),
    }
    let Some(host) = uri.host().filter(|host| !host.is_empty()) else {
        return Err(invalid_url(trimmed, "missing host"));
    };
    let port = uri.port_u16().unwrap_or(DEFAULT_PORT);
    let path = match uri.path() {
        "" => "/",
        path => path,
    };
    let query = uri.query().map(|q| format!("?{q}")).unwrap_or_default();
    Ok(format!("ws://{host}:{port}{path}{query}").into())
}

fn invalid(message: impl Display) -> ClientError {
    ClientError::InvalidConfig(message.to_string().into())
}

fn located(path: &Path, detail: impl Display) -> ClientError {
    invalid(format!("{}: {detail}", path.display()))
}

fn invalid_url(url: &str, detail: impl Display) -> ClientError {
    invalid(format!("invalid url '{url}': {detail}"))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientToml {
    connection: Option<ConnectionSection>,
    log: Option<LogSection>,
    console: Option<ConsoleSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionSection {
    url: String,
    subprotocol: Option<String>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConsoleSection {
    refresh_ms: Option<u64>,
    chart_buckets: Option<usize>,
}

impl ClientToml {
    fn into_config(self) -> Result<ClientConfig, ClientError> {
        let connection = match self.connection {
            Some(section) => section.into_config()?,
            None => ConnectionConfig::default(),
        };
        let log_level = match self.log.and_then(|log| log.level) {
            Some(level) => {
                let level = level.trim().to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(invalid(format!("invalid log.level '{level}'")));
                }
                Some(SmolStr::new(level))
            }
            None => None,
        };
        let console = match self.console {
            Some(section) => section.into_config()?,
            None => ConsoleConfig::default(),
        };
        Ok(ClientConfig {
            connection,
            log_level,
            console,
        })
    }
}

impl ConnectionSection {
    fn into_config(self) -> Result<ConnectionConfig, ClientError> {
        let url = normalize_url(&self.url)?;
        let subprotocol = self
            .subprotocol
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_SUBPROTOCOL.to_string());
        if subprotocol.is_empty() || !subprotocol.bytes().all(|byte| byte.is_ascii_graphic()) {
            let message = format!("invalid connection.subprotocol '{subprotocol}'");
            return Err(invalid(message));
        }
        let read_timeout_ms = self.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS);
        if read_timeout_ms == 0 {
            return Err(invalid("connection.read_timeout_ms must be > 0"));
        }
        Ok(ConnectionConfig {
            url,
            subprotocol: SmolStr::new(subprotocol),
            read_timeout: Duration::from_millis(read_timeout_ms),
        })
    }
}

impl ConsoleSection {
    fn into_config(self) -> Result<ConsoleConfig, ClientError> {
        let refresh_ms = self.refresh_ms.unwrap_or(DEFAULT_REFRESH_MS);
        if refresh_ms < 10 {
            return Err(invalid("console.refresh_ms must be >= 10"));
        }
        let chart_buckets = self.chart_buckets.unwrap_or(DEFAULT_CHART_BUCKETS);
        if chart_buckets < 8 {
            return Err(invalid("console.chart_buckets must be >= 8"));
        }
        Ok(ConsoleConfig {
            refresh: Duration::from_millis(refresh_ms),
            chart_buckets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let text = r#"
[connection]
url = "ws://roaster.local:81/"
subprotocol = "arduino"
read_timeout_ms = 20

[log]
level = "DEBUG"

[console]
refresh_ms = 250
chart_buckets = 120
"#;
        let config = ClientConfig::from_toml_str(text).expect("config");
        assert_eq!(config.connection.url, "ws://roaster.local:81/");
        assert_eq!(config.connection.read_timeout, Duration::from_millis(20));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.console.refresh, Duration::from_millis(250));
        assert_eq!(config.console.chart_buckets, 120);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = ClientConfig::from_toml_str("").expect("config");
        assert_eq!(config, ClientConfig::default());
        let text = "[connection]\nurl = \"10.0.0.7\"\n";
        let config = ClientConfig::from_toml_str(text).expect("config");
        assert_eq!(config.connection.url, "ws://10.0.0.7:81/");
        assert_eq!(config.connection.subprotocol, DEFAULT_SUBPROTOCOL);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            ("[connection]\nurl = \"wss://x\"\n", "not supported"),
            ("[connection]\nurl = \"http://x\"\n", "ws:// scheme"),
            (
                "[connection]\nurl = \"ws://x\"\nread_timeout_ms = 0\n",
                "read_timeout_ms",
            ),
            ("[log]\nlevel = \"loud\"\n", "invalid log.level"),
            ("[console]\nchart_buckets = 2\n", "chart_buckets"),
            ("[console]\nrefresh = 5\n", "unknown field"),
        ];
        for (text, expected) in cases {
            let err = ClientConfig::from_toml_str(text).expect_err(text);
            assert!(
                err.to_string().contains(expected),
                "{text}: '{err}' should mention '{expected}'"
            );
        }
    }

    #[test]
    fn url_normalization() {
        assert_eq!(
            normalize_url("roaster.local").expect("url"),
            "ws://roaster.local:81/"
        );
        assert_eq!(
            normalize_url("ws://10.0.0.5:8081/ws?x=1").expect("url"),
            "ws://10.0.0.5:8081/ws?x=1"
        );
        assert!(normalize_url("  ").is_err());
    }
}
