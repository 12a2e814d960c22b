//! Textual cache policy specs.
//!
//! A spec is a comma-separated list of `key=value` pairs, for example
//! `maximumSize=10000,expireAfterWrite=30s`. A blank spec selects [`DEFAULT_SPEC`], and the
//! case-insensitive token `disabled` turns caching off entirely.

use std::time::Duration;

use thiserror::Error;

/// The spec used when none (or a blank one) is configured.
pub const DEFAULT_SPEC: &str = "maximumSize=10000,expireAfterWrite=30s";

/// The token that disables caching.
pub const DISABLED_TOKEN: &str = "disabled";

/// Errors produced while parsing a policy spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Two commas with nothing between them.
    #[error("blank key-value pair in cache spec '{0}'")]
    BlankPair(String),

    /// A key outside the recognized set.
    #[error("unknown cache spec key '{0}'")]
    UnknownKey(String),

    /// A key given twice.
    #[error("cache spec key '{0}' was already set")]
    DuplicateKey(String),

    /// A key without `=value`.
    #[error("cache spec key '{0}' requires a value")]
    MissingValue(String),

    /// A count that is not a non-negative integer.
    #[error("cache spec key '{key}' has invalid number '{value}'")]
    InvalidNumber {
        /// The offending key.
        key: String,
        /// The value as written.
        value: String,
    },

    /// A duration that is not `<n>` followed by `d`, `h`, `m` or `s`.
    #[error("cache spec key '{key}' has invalid duration '{value}' (expected e.g. 30s, 5m, 1h, 2d)")]
    InvalidDuration {
        /// The offending key.
        key: String,
        /// The value as written.
        value: String,
    },
}

/// Bounds for an enabled cache. `None` means "unbounded" for that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Capacity hint for the backing map.
    pub initial_capacity: Option<usize>,
    /// Maximum number of memoized entries; least recently used entries are evicted beyond it.
    pub maximum_size: Option<usize>,
    /// Entries older than this (since last write) are treated as absent.
    pub expire_after_write: Option<Duration>,
    /// Entries not read or written for this long are treated as absent.
    pub expire_after_access: Option<Duration>,
}

/// A parsed spec: either caching is off, or it runs with a [`CachePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySpec {
    /// Every lookup goes straight to the compute function.
    Disabled,
    /// Lookups are memoized under this policy.
    Enabled(CachePolicy),
}

impl PolicySpec {
    /// Parse a spec, applying the blank-means-default and `disabled` rules.
    pub fn parse(raw: Option<&str>) -> Result<Self, PolicyError> {
        let raw = raw.map(str::trim).unwrap_or_default();
        let raw = if raw.is_empty() { DEFAULT_SPEC } else { raw };
        if raw.eq_ignore_ascii_case(DISABLED_TOKEN) {
            return Ok(Self::Disabled);
        }
        CachePolicy::parse(raw).map(Self::Enabled)
    }

    /// The policy in effect, or `None` when disabled.
    #[must_use]
    pub fn policy(&self) -> Option<&CachePolicy> {
        match self {
            Self::Disabled => None,
            Self::Enabled(policy) => Some(policy),
        }
    }
}

impl Default for PolicySpec {
    fn default() -> Self {
        // Mirrors DEFAULT_SPEC.
        Self::Enabled(CachePolicy {
            initial_capacity: None,
            maximum_size: Some(10_000),
            expire_after_write: Some(Duration::from_secs(30)),
            expire_after_access: None,
        })
    }
}

impl CachePolicy {
    /// Parse a non-empty `key=value,...` spec.
    pub fn parse(spec: &str) -> Result<Self, PolicyError> {
        let mut policy = Self::default();
        for pair in spec.split(',').map(str::trim) {
            if pair.is_empty() {
                return Err(PolicyError::BlankPair(spec.to_owned()));
            }
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (pair, None),
            };
            policy.apply(key, value)?;
        }
        Ok(policy)
    }

    fn apply(&mut self, key: &str, value: Option<&str>) -> Result<(), PolicyError> {
        let required = || {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PolicyError::MissingValue(key.to_owned()))
        };
        match key {
            "initialCapacity" => {
                let count = parse_count(key, required()?)?;
                set_once(&mut self.initial_capacity, key, count)
            }
            "maximumSize" => {
                let count = parse_count(key, required()?)?;
                set_once(&mut self.maximum_size, key, count)
            }
            "expireAfterWrite" => {
                let ttl = parse_duration(key, required()?)?;
                set_once(&mut self.expire_after_write, key, ttl)
            }
            "expireAfterAccess" => {
                let ttl = parse_duration(key, required()?)?;
                set_once(&mut self.expire_after_access, key, ttl)
            }
            other => Err(PolicyError::UnknownKey(other.to_owned())),
        }
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<(), PolicyError> {
    if slot.is_some() {
        return Err(PolicyError::DuplicateKey(key.to_owned()));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_count(key: &str, value: &str) -> Result<usize, PolicyError> {
    value.parse().map_err(|_| PolicyError::InvalidNumber {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

/// Parse `<n><unit>` where unit is one of `d`, `h`, `m`, `s`.
fn parse_duration(key: &str, value: &str) -> Result<Duration, PolicyError> {
    let invalid = || PolicyError::InvalidDuration {
        key: key.to_owned(),
        value: value.to_owned(),
    };
    let (unit_at, _) = value.char_indices().last().ok_or_else(invalid)?;
    let (amount, unit) = value.split_at(unit_at);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;
    let secs_per_unit = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_spec_selects_default() {
        assert_eq!(PolicySpec::parse(None), Ok(PolicySpec::default()));
        assert_eq!(PolicySpec::parse(Some("")), Ok(PolicySpec::default()));
        assert_eq!(PolicySpec::parse(Some("   ")), Ok(PolicySpec::default()));
        assert_eq!(
            PolicySpec::parse(Some(DEFAULT_SPEC)),
            Ok(PolicySpec::default())
        );
    }

    #[test]
    fn disabled_is_case_insensitive() {
        for raw in ["disabled", "DISABLED", "Disabled", " disabled "] {
            assert_eq!(PolicySpec::parse(Some(raw)), Ok(PolicySpec::Disabled));
        }
    }

    #[test]
    fn parses_all_keys() {
        let policy = CachePolicy::parse(
            "initialCapacity=16, maximumSize=5,expireAfterWrite=2m,expireAfterAccess=1h",
        )
        .unwrap();
        assert_eq!(
            policy,
            CachePolicy {
                initial_capacity: Some(16),
                maximum_size: Some(5),
                expire_after_write: Some(Duration::from_secs(120)),
                expire_after_access: Some(Duration::from_secs(3600)),
            }
        );
    }

    #[test]
    fn parses_day_durations() {
        let policy = CachePolicy::parse("expireAfterWrite=2d").unwrap();
        assert_eq!(
            policy.expire_after_write,
            Some(Duration::from_secs(2 * 24 * 3600))
        );
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!(matches!(
            CachePolicy::parse("maximumSize=10,bogus=1"),
            Err(PolicyError::UnknownKey(k)) if k == "bogus"
        ));
        assert!(matches!(
            CachePolicy::parse("maximumSize=1,maximumSize=2"),
            Err(PolicyError::DuplicateKey(_))
        ));
        assert!(matches!(
            CachePolicy::parse("maximumSize"),
            Err(PolicyError::MissingValue(_))
        ));
        assert!(matches!(
            CachePolicy::parse("maximumSize=lots"),
            Err(PolicyError::InvalidNumber { .. })
        ));
        assert!(matches!(
            CachePolicy::parse("expireAfterWrite=30"),
            Err(PolicyError::InvalidDuration { .. })
        ));
        assert!(matches!(
            CachePolicy::parse("expireAfterWrite=30w"),
            Err(PolicyError::InvalidDuration { .. })
        ));
        assert!(matches!(
            CachePolicy::parse("maximumSize=1,"),
            Err(PolicyError::BlankPair(_))
        ));
    }
}
