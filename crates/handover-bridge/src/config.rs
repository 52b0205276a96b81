//! Bridge configuration, loaded from TOML.
//!
//! ```toml
//! [engine]
//! engine_id = "flutter_embedding_engine"
//! entrypoint = "main"
//! library_uri = "package:app/main.dart"
//!
//! [handover]
//! response_timeout_ms = 30000
//! ```

use crate::engine::Entrypoint;
use handover_core::ENGINE_ID;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub engine: EngineConfig,
    pub handover: HandoverConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache key the running engine is stored under.
    pub engine_id: String,
    /// Entrypoint function name.
    pub entrypoint: String,
    /// Library holding the entrypoint; unset means the bundle's default.
    pub library_uri: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_id: ENGINE_ID.to_string(),
            entrypoint: "main".to_string(),
            library_uri: None,
        }
    }
}

impl EngineConfig {
    pub fn entrypoint(&self) -> Entrypoint {
        Entrypoint {
            library_uri: self.library_uri.clone(),
            function: self.entrypoint.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HandoverConfig {
    /// Pending handovers older than this fail with a timeout. Unset waits forever.
    ///
    /// Expiry runs every [`HandoverConfig::sweep_period`], so a call fails
    /// within 1.1x the timeout (at least 10ms late for very short timeouts).
    pub response_timeout_ms: Option<u64>,
}

/// Floor for the expiry sweep period.
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

impl HandoverConfig {
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }

    /// How often stale calls are expired: a tenth of the timeout.
    pub fn sweep_period(&self) -> Option<Duration> {
        self.response_timeout()
            .map(|timeout| (timeout / 10).max(MIN_SWEEP_PERIOD))
    }
}

impl BridgeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine.engine_id, ENGINE_ID);
        assert_eq!(config.engine.entrypoint(), Entrypoint::default());
        assert_eq!(config.handover.response_timeout(), None);
    }

    #[test]
    fn partial_config_overrides() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [engine]
            library_uri = "package:app/main.dart"

            [handover]
            response_timeout_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.engine_id, ENGINE_ID);
        assert_eq!(config.engine.library_uri.as_deref(), Some("package:app/main.dart"));
        assert_eq!(
            config.handover.response_timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn sweep_period_bounds_the_overshoot() {
        let config = HandoverConfig {
            response_timeout_ms: Some(30_000),
        };
        assert_eq!(config.sweep_period(), Some(Duration::from_secs(3)));

        let short = HandoverConfig {
            response_timeout_ms: Some(20),
        };
        assert_eq!(short.sweep_period(), Some(Duration::from_millis(10)));
        assert_eq!(HandoverConfig::default().sweep_period(), None);
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        assert!(matches!(
            BridgeConfig::from_toml_str("[handover]\nresponse_timeout_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = BridgeConfig::load("/nonexistent/handover.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/handover.toml"));
    }
}
