//! Engine configuration.

#![allow(missing_docs)]

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::TraceError;

/// Engine tuning and skip rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracerConfig {
    /// Fold source-unit identities to lower case, for hosts on
    /// case-insensitive filesystems.
    pub fold_unit_case: bool,
    /// fnmatch-style unit patterns the session never stops in.
    pub skip_units: Vec<SmolStr>,
    /// Code units whose call events are never delivered.
    pub skip_calls: Vec<SkipCall>,
    /// Swap the thread to call/return-only delivery in frames with nothing
    /// to watch.
    pub optimize_instrumentation: bool,
}

/// One (unit, entry line) pair excluded from call notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkipCall {
    /// Source-unit identity.
    pub unit: SmolStr,
    /// Entry line of the code unit.
    pub entry_line: u32,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            fold_unit_case: false,
            skip_units: Vec::new(),
            skip_calls: Vec::new(),
            optimize_instrumentation: true,
        }
    }
}

impl TracerConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self, TraceError> {
        toml::from_str(text)
            .map_err(|err| TraceError::InvalidConfig(SmolStr::from(err.to_string())))
    }
}
