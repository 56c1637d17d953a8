//! Attach configuration.

#![allow(missing_docs)]

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::AttachError;

/// Default transport host, matching the front end's default.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default transport port, matching the front end's default.
pub const DEFAULT_PORT: u16 = 7935;

/// One attach request: where the spliced-in session's front end should
/// reach its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachRequest {
    /// Transport host.
    pub host: SmolStr,
    /// Transport port.
    pub port: u16,
}

impl Default for AttachRequest {
    fn default() -> Self {
        Self {
            host: SmolStr::new_static(DEFAULT_HOST),
            port: DEFAULT_PORT,
        }
    }
}

/// Attach endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttachConfig {
    /// Transport host the attached session listens on.
    pub host: SmolStr,
    /// Transport port the attached session listens on.
    pub port: u16,
    /// Signal number that triggers an attach request.
    pub signum: i32,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            host: SmolStr::new_static(DEFAULT_HOST),
            port: DEFAULT_PORT,
            signum: default_signal(),
        }
    }
}

#[cfg(unix)]
fn default_signal() -> i32 {
    signal_hook::consts::SIGUSR1
}

#[cfg(not(unix))]
fn default_signal() -> i32 {
    0
}

impl AttachConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self, AttachError> {
        toml::from_str(text)
            .map_err(|err| AttachError::InvalidConfig(SmolStr::from(err.to_string())))
    }

    /// Parse a `host:port` endpoint string.
    pub fn parse_endpoint(text: &str) -> Result<(SmolStr, u16), AttachError> {
        let (host, port) = text.rsplit_once(':').ok_or_else(|| {
            AttachError::InvalidConfig(SmolStr::from(format!("missing port in '{text}'")))
        })?;
        let port = port.parse::<u16>().map_err(|err| {
            AttachError::InvalidConfig(SmolStr::from(format!("bad port in '{text}': {err}")))
        })?;
        if host.is_empty() {
            return Err(AttachError::InvalidConfig(SmolStr::from(format!(
                "missing host in '{text}'"
            ))));
        }
        Ok((SmolStr::from(host), port))
    }

    /// The request this configuration describes.
    #[must_use]
    pub fn request(&self) -> AttachRequest {
        AttachRequest {
            host: self.host.clone(),
            port: self.port,
        }
    }
}
