//! # Global executor configuration.
//!
//! [`Config`] defines how a [`RetryExecutor`](crate::RetryExecutor) behaves when a
//! call does not pass an explicit policy: which preset is the default, how each
//! preset is tuned, which component name tags the logs, and whether delays are
//! jittered.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use opvisor::{Config, PolicyPreset};
//!
//! let mut cfg = Config::default();
//! cfg.component = "TASKS".into();
//! cfg.default_preset = PolicyPreset::Critical;
//! cfg.presets.get_mut(&PolicyPreset::Critical).unwrap().max_retries = 7;
//!
//! assert_eq!(cfg.default_policy().max_retries, 7);
//! assert_eq!(cfg.policy(PolicyPreset::Fast).base_delay, Duration::from_millis(500));
//! ```

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::policies::{PolicyPreset, RetryPolicy};

/// Global configuration of the executor and the facade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preset used when a call passes no policy.
    pub default_preset: PolicyPreset,
    /// Tuning of every preset. Missing entries fall back to the built-in values.
    ///
    /// When deserialized, fields absent from an entry keep that preset's
    /// built-in values.
    #[serde(deserialize_with = "overlay_presets")]
    pub presets: BTreeMap<PolicyPreset, RetryPolicy>,
    /// Component tag carried by log records (`CLIENT`, `TASKS`, ...).
    pub component: String,
    /// Jitter backoff delays (disable for reproducible timings).
    pub jitter: bool,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `default_preset = standard`
    /// - `presets` = built-in values of every preset
    /// - `component = "CLIENT"`
    /// - `jitter = true`
    fn default() -> Self {
        Self {
            default_preset: PolicyPreset::default(),
            presets: PolicyPreset::ALL
                .into_iter()
                .map(|p| (p, p.policy()))
                .collect(),
            component: "CLIENT".to_string(),
            jitter: true,
        }
    }
}

impl Config {
    /// Parses a JSON configuration document and validates it.
    ///
    /// Absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Policy configured for `preset`.
    pub fn policy(&self, preset: PolicyPreset) -> RetryPolicy {
        self.presets
            .get(&preset)
            .copied()
            .unwrap_or_else(|| preset.policy())
    }

    /// Policy of the default preset.
    pub fn default_policy(&self) -> RetryPolicy {
        self.policy(self.default_preset)
    }

    /// Validates every configured preset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.presets.values().try_for_each(RetryPolicy::validate)
    }
}

/// Reads each preset entry as a patch over the preset's own built-in policy.
fn overlay_presets<'de, D>(deserializer: D) -> Result<BTreeMap<PolicyPreset, RetryPolicy>, D::Error>
where
    D: Deserializer<'de>,
{
    let patches = BTreeMap::<PolicyPreset, Map<String, Value>>::deserialize(deserializer)?;
    patches
        .into_iter()
        .map(|(preset, patch)| {
            let mut fields = match serde_json::to_value(preset.policy()) {
                Ok(Value::Object(fields)) => fields,
                _ => Map::new(),
            };
            fields.extend(patch);
            let policy = serde_json::from_value(Value::Object(fields)).map_err(D::Error::custom)?;
            Ok((preset, policy))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_carries_every_preset() {
        let cfg = Config::default();
        for preset in PolicyPreset::ALL {
            assert_eq!(cfg.policy(preset), preset.policy());
        }
        assert_eq!(cfg.default_policy(), RetryPolicy::standard());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_preset_falls_back_to_builtin() {
        let mut cfg = Config::default();
        cfg.presets.clear();
        assert_eq!(cfg.policy(PolicyPreset::Critical), RetryPolicy::critical());
    }

    #[test]
    fn test_from_json_overrides_selected_fields() {
        let cfg = Config::from_json_str(
            r#"{
                "default_preset": "fast",
                "component": "TASKS",
                "jitter": false,
                "presets": { "fast": { "max_retries": 4, "base_delay_ms": 200, "max_delay_ms": 2000 } }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.default_preset, PolicyPreset::Fast);
        assert_eq!(cfg.component, "TASKS");
        assert!(!cfg.jitter);
        let fast = cfg.default_policy();
        assert_eq!(fast.max_retries, 4);
        assert_eq!(fast.base_delay, Duration::from_millis(200));
        // Replacing the map drops the other overrides, built-ins still apply.
        assert_eq!(cfg.policy(PolicyPreset::Standard), RetryPolicy::standard());
    }

    #[test]
    fn test_partial_preset_keeps_its_own_builtins() {
        let cfg = Config::from_json_str(r#"{"presets": {"fast": {"max_retries": 4}}}"#).unwrap();

        let fast = cfg.policy(PolicyPreset::Fast);
        assert_eq!(fast.max_retries, 4);
        assert_eq!(fast.base_delay, Duration::from_millis(500));
        assert_eq!(fast.max_delay, Duration::from_secs(5));
        assert_eq!(fast.backoff_factor, 1.5);

        let critical = Config::from_json_str(r#"{"presets": {"critical": {"backoff_factor": 3.0}}}"#)
            .unwrap()
            .policy(PolicyPreset::Critical);
        assert_eq!(critical.max_retries, 5);
        assert_eq!(critical.max_delay, Duration::from_secs(60));
        assert_eq!(critical.backoff_factor, 3.0);
    }

    #[test]
    fn test_from_json_rejects_invalid_documents() {
        assert!(matches!(
            Config::from_json_str(r#"{"default_preset": "turbo"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_json_str(
                r#"{"presets": {"standard": {"base_delay_ms": 5000, "max_delay_ms": 100}}}"#
            ),
            Err(ConfigError::DelayBounds { .. })
        ));
    }
}
