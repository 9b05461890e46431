//! # Retry policy and named presets.
//!
//! [`RetryPolicy`] bounds how often and how patiently an operation is retried:
//! - [`RetryPolicy::max_retries`] retries after the first attempt;
//! - [`RetryPolicy::base_delay`] the delay before the first retry (before jitter);
//! - [`RetryPolicy::max_delay`] the cap applied to every delay;
//! - [`RetryPolicy::backoff_factor`] the multiplicative growth factor.
//!
//! Calling code usually picks a [`PolicyPreset`] by name:
//!
//! | Preset     | Retries | Base    | Max     | Factor |
//! |------------|---------|---------|---------|--------|
//! | `critical` | 5       | 1000 ms | 60 s    | 2.0    |
//! | `standard` | 3       | 1000 ms | 30 s    | 2.0    |
//! | `fast`     | 2       | 500 ms  | 5 s     | 1.5    |
//! | `none`     | 0       | 1000 ms | 30 s    | 2.0    |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Retry bounds for one `execute` call.
///
/// Immutable once handed to the executor (`Copy`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (`0` = single attempt).
    pub max_retries: u32,
    /// Delay before the first retry, before jitter.
    #[serde(rename = "base_delay_ms", with = "millis")]
    pub base_delay: Duration,
    /// Upper bound for any delay.
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    /// Multiplicative growth factor (`>= 1.0`).
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    /// Returns the `standard` preset.
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// For writes that must land: 5 retries, 1 s → 60 s, factor 2.
    pub const fn critical() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(60_000),
            backoff_factor: 2.0,
        }
    }

    /// For ordinary calls: 3 retries, 1 s → 30 s, factor 2.
    pub const fn standard() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
        }
    }

    /// For quick probes: 2 retries, 500 ms → 5 s, factor 1.5.
    pub const fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5_000),
            backoff_factor: 1.5,
        }
    }

    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// Looks up a preset by name (`critical`, `standard`, `fast`, `none`).
    ///
    /// # Example
    /// ```
    /// use opvisor::RetryPolicy;
    ///
    /// assert_eq!(RetryPolicy::preset("fast").unwrap(), RetryPolicy::fast());
    /// assert!(RetryPolicy::preset("turbo").is_err());
    /// ```
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        name.parse::<PolicyPreset>().map(PolicyPreset::policy)
    }

    /// Returns a copy with a different retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Total attempts allowed (`max_retries + 1`).
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Checks `max_delay >= base_delay` and `backoff_factor >= 1.0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_delay < self.base_delay {
            return Err(ConfigError::DelayBounds {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::Factor(self.backoff_factor));
        }
        Ok(())
    }
}

/// Named [`RetryPolicy`] presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    Critical,
    #[default]
    Standard,
    Fast,
    None,
}

impl PolicyPreset {
    /// Every preset.
    pub const ALL: [PolicyPreset; 4] = [
        PolicyPreset::Critical,
        PolicyPreset::Standard,
        PolicyPreset::Fast,
        PolicyPreset::None,
    ];

    /// Built-in policy of this preset.
    pub fn policy(self) -> RetryPolicy {
        match self {
            PolicyPreset::Critical => RetryPolicy::critical(),
            PolicyPreset::Standard => RetryPolicy::standard(),
            PolicyPreset::Fast => RetryPolicy::fast(),
            PolicyPreset::None => RetryPolicy::none(),
        }
    }

    /// Lower-case preset name.
    pub fn name(self) -> &'static str {
        match self {
            PolicyPreset::Critical => "critical",
            PolicyPreset::Standard => "standard",
            PolicyPreset::Fast => "fast",
            PolicyPreset::None => "none",
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyPreset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for preset in PolicyPreset::ALL {
            assert!(preset.policy().validate().is_ok(), "{preset}");
        }
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
        assert_eq!(RetryPolicy::critical().max_attempts(), 6);
    }

    #[test]
    fn test_preset_names_parse() {
        assert_eq!("Critical".parse::<PolicyPreset>().unwrap(), PolicyPreset::Critical);
        assert_eq!(" none ".parse::<PolicyPreset>().unwrap(), PolicyPreset::None);
        assert_eq!(
            RetryPolicy::preset("turbo"),
            Err(ConfigError::UnknownPreset("turbo".into()))
        );
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::standard()
        };
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::DelayBounds { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_shrinking_factor() {
        for factor in [0.5, f64::NAN, f64::INFINITY] {
            let policy = RetryPolicy {
                backoff_factor: factor,
                ..RetryPolicy::standard()
            };
            assert!(matches!(policy.validate(), Err(ConfigError::Factor(_))));
        }
    }

    #[test]
    fn test_serde_uses_milliseconds() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_retries":4,"base_delay_ms":250,"max_delay_ms":8000}"#)
                .unwrap();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(8));
        assert_eq!(policy.backoff_factor, 2.0);

        let json = serde_json::to_value(RetryPolicy::fast()).unwrap();
        assert_eq!(json["base_delay_ms"], 500);
        assert_eq!(json["backoff_factor"], 1.5);
    }
}
