//! Pipeline configuration.
//!
//! Values come from an optional YAML file and are then overridden by
//! environment variables:
//!
//! - `GATEKEEPER_POLICY_PATH`: policy file to activate (default: built-in `v1`)
//! - `GATEKEEPER_RUNS_DIR`: run bundle root (default: `runs`)
//! - `GATEKEEPER_OUTBOX_DIR`: outbox root (default: `outbox`)
//! - `GATEKEEPER_MAX_INPUT_BYTES`: raw text size limit (default: 65536)

use std::path::{Path, PathBuf};

use gk_core::{Confidence, RunId, DEFAULT_RUN_PREFIX};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default raw text limit, 64 KiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024;

/// Default low-confidence threshold in basis points.
pub const DEFAULT_LOW_CONFIDENCE_BP: u16 = 5_000;

/// Overrides [`PipelineConfig::policy_path`].
pub const ENV_POLICY_PATH: &str = "GATEKEEPER_POLICY_PATH";
/// Overrides [`PipelineConfig::runs_dir`].
pub const ENV_RUNS_DIR: &str = "GATEKEEPER_RUNS_DIR";
/// Overrides [`PipelineConfig::outbox_dir`].
pub const ENV_OUTBOX_DIR: &str = "GATEKEEPER_OUTBOX_DIR";
/// Overrides [`PipelineConfig::max_input_bytes`].
pub const ENV_MAX_INPUT_BYTES: &str = "GATEKEEPER_MAX_INPUT_BYTES";

/// Runtime settings for the gatekeeper pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Policy file to activate. `None` uses the built-in standard policy.
    pub policy_path: Option<PathBuf>,
    /// Root directory for run bundles.
    pub runs_dir: PathBuf,
    /// Root directory for outbox artifacts.
    pub outbox_dir: PathBuf,
    /// Largest accepted raw submission, in bytes.
    pub max_input_bytes: usize,
    /// Fields whose best candidate is below this are low confidence.
    pub low_confidence_threshold: Confidence,
    /// Run id prefix.
    pub run_id_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            runs_dir: PathBuf::from("runs"),
            outbox_dir: PathBuf::from("outbox"),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            low_confidence_threshold: Confidence::from_basis_points(DEFAULT_LOW_CONFIDENCE_BP)
                .unwrap_or(Confidence::ZERO),
            run_id_prefix: DEFAULT_RUN_PREFIX.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read a YAML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot: a non-zero size limit and a usable run id
    /// prefix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_input_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_input_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        RunId::check_prefix(&self.run_id_prefix).map_err(|_| ConfigError::Invalid {
            field: "run_id_prefix",
            reason: format!(
                "{:?} is not 1 to 16 lowercase ASCII letters or digits",
                self.run_id_prefix
            ),
        })
    }

    /// Defaults or `path`, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup(ENV_POLICY_PATH) {
            self.policy_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup(ENV_RUNS_DIR) {
            self.runs_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTBOX_DIR) {
            self.outbox_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_MAX_INPUT_BYTES) {
            self.max_input_bytes = match raw.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidOverride {
                        var: ENV_MAX_INPUT_BYTES,
                        value: raw,
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::InvalidOverride {
                        var: ENV_MAX_INPUT_BYTES,
                        value: raw,
                        reason: e.to_string(),
                    })
                }
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.max_input_bytes, 65_536);
        assert_eq!(c.low_confidence_threshold.basis_points(), 5_000);
        assert_eq!(c.run_id_prefix, "gk");
        assert_eq!(c.policy_path, None);
    }

    #[test]
    fn env_overrides_apply() {
        let mut c = PipelineConfig::default();
        c.apply_overrides(lookup(&[
            ("GATEKEEPER_POLICY_PATH", "/etc/gk/v2.yaml"),
            ("GATEKEEPER_RUNS_DIR", "/var/gk/runs"),
            ("GATEKEEPER_OUTBOX_DIR", "/var/gk/outbox"),
            ("GATEKEEPER_MAX_INPUT_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(c.policy_path, Some(PathBuf::from("/etc/gk/v2.yaml")));
        assert_eq!(c.runs_dir, PathBuf::from("/var/gk/runs"));
        assert_eq!(c.outbox_dir, PathBuf::from("/var/gk/outbox"));
        assert_eq!(c.max_input_bytes, 1024);
    }

    #[test]
    fn bad_size_override_is_rejected() {
        for bad in ["lots", "0", "-5"] {
            let mut c = PipelineConfig::default();
            let err = c
                .apply_overrides(lookup(&[("GATEKEEPER_MAX_INPUT_BYTES", bad)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidOverride { .. }), "{bad}");
        }
    }

    #[test]
    fn yaml_file_with_partial_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeeper.yaml");
        std::fs::write(&path, "max_input_bytes: 2048\nlow_confidence_threshold: 7500\n").unwrap();
        let c = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(c.max_input_bytes, 2048);
        assert_eq!(c.low_confidence_threshold.basis_points(), 7500);
        assert_eq!(c.runs_dir, PathBuf::from("runs"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeeper.yaml");
        std::fs::write(&path, "max_bytes: 2048\n").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn zero_size_limit_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeeper.yaml");
        std::fs::write(&path, "max_input_bytes: 0\n").unwrap();
        match PipelineConfig::from_file(&path).unwrap_err() {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "max_input_bytes"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn bad_run_id_prefix_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeeper.yaml");
        std::fs::write(&path, "run_id_prefix: GK-Prod\n").unwrap();
        match PipelineConfig::from_file(&path).unwrap_err() {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "run_id_prefix"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(PipelineConfig::default().validate().is_ok());
        let custom = PipelineConfig {
            run_id_prefix: "site42".into(),
            max_input_bytes: 1,
            ..PipelineConfig::default()
        };
        assert!(custom.validate().is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/gatekeeper.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
