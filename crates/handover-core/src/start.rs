//! Start parameters handed to the engine entrypoint.

use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend environment the engine connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Dev,
    Tst,
    Uat,
    Pilot,
    Prod,
    Demo,
    Mock,
}

impl Environment {
    /// Every allowed environment.
    pub const ALL: [Environment; 7] = [
        Environment::Dev,
        Environment::Tst,
        Environment::Uat,
        Environment::Pilot,
        Environment::Prod,
        Environment::Demo,
        Environment::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "DEV",
            Environment::Tst => "TST",
            Environment::Uat => "UAT",
            Environment::Pilot => "PILOT",
            Environment::Prod => "PROD",
            Environment::Demo => "DEMO",
            Environment::Mock => "MOCK",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| BridgeError::InvalidStartParams(format!("unknown environment: {s}")))
    }
}

/// Parameters the engine entrypoint receives as its sole argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    pub environment: Environment,
    pub language: String,
    pub theme_mode: String,
}

impl StartParams {
    pub fn new(
        environment: Environment,
        language: impl Into<String>,
        theme_mode: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            language: language.into(),
            theme_mode: theme_mode.into(),
        }
    }

    /// The JSON start-config string passed to the entrypoint.
    pub fn to_start_config(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::InvalidStartParams(e.to_string()))
    }

    /// Parse a start-config string produced by [`StartParams::to_start_config`].
    pub fn from_start_config(config: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(config).map_err(|e| BridgeError::InvalidStartParams(e.to_string()))
    }
}
