//! Declarative retry configuration.
//!
//! With the `serde` feature these types can be read from any serde format. Durations are
//! written as whole milliseconds.
//!
//! ```rust,ignore
//! use retrywrap::RetrierConfig;
//!
//! let config: RetrierConfig = serde_json::from_str(r#"{
//!     "max_attempts": 4,
//!     "backoff": { "strategy": "exponential", "min_wait": 100, "max_wait": 5000 }
//! }"#)?;
//!
//! let retrier = config.into_retrier::<std::io::Error>()?;
//! assert_eq!(retrier.max_attempts(), 4);
//! ```

use std::time::Duration;

use super::backoff::{
    Backoff, BackoffFactory, DecorrelatedExponentialBackoff, ExponentialBackoff, FixedBackoff,
    NoopBackoff,
};
use super::error::ConfigError;
use super::retrier::Retrier;

/// Which backoff a retrier uses, and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "strategy", rename_all = "snake_case"))]
pub enum BackoffConfig {
    /// Retry without waiting.
    None,
    /// Wait the same amount after every failure.
    Fixed {
        /// Time between attempts.
        #[cfg_attr(feature = "serde", serde(with = "millis"))]
        wait: Duration,
    },
    /// Doubling waits between two bounds.
    Exponential {
        /// First wait, and floor of every wait.
        #[cfg_attr(feature = "serde", serde(with = "millis"))]
        min_wait: Duration,
        /// Cap before jitter.
        #[cfg_attr(feature = "serde", serde(with = "millis"))]
        max_wait: Duration,
        /// Scale each wait by a random factor in `[0.5, 1.0]`.
        #[cfg_attr(feature = "serde", serde(default = "default_jitter"))]
        jitter: bool,
    },
    /// Decorrelated jitter between two bounds.
    DecorrelatedExponential {
        /// First wait, and floor of every wait.
        #[cfg_attr(feature = "serde", serde(with = "millis"))]
        min_wait: Duration,
        /// Cap of every wait.
        #[cfg_attr(feature = "serde", serde(with = "millis"))]
        max_wait: Duration,
    },
}

#[cfg(feature = "serde")]
fn default_jitter() -> bool {
    true
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::DecorrelatedExponential {
            min_wait: DecorrelatedExponentialBackoff::DEFAULT_MIN_WAIT,
            max_wait: DecorrelatedExponentialBackoff::DEFAULT_MAX_WAIT,
        }
    }
}

impl BackoffConfig {
    /// Check that the bounds are ordered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Exponential {
                min_wait, max_wait, ..
            }
            | Self::DecorrelatedExponential { min_wait, max_wait }
                if min_wait > max_wait =>
            {
                Err(ConfigError::InvertedBounds { min_wait, max_wait })
            }
            _ => Ok(()),
        }
    }
}

impl BackoffFactory for BackoffConfig {
    fn new_backoff(&self) -> Box<dyn Backoff> {
        match *self {
            Self::None => NoopBackoff.new_backoff(),
            Self::Fixed { wait } => FixedBackoff::new(wait).new_backoff(),
            Self::Exponential {
                min_wait,
                max_wait,
                jitter,
            } => ExponentialBackoff::new(min_wait, max_wait)
                .with_jitter(jitter)
                .new_backoff(),
            Self::DecorrelatedExponential { min_wait, max_wait } => {
                DecorrelatedExponentialBackoff::new(min_wait, max_wait).new_backoff()
            }
        }
    }
}

/// Everything needed to build a [`Retrier`] except the retriability predicate.
///
/// Missing fields fall back to the retrier defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetrierConfig {
    /// Total attempts, including the first.
    pub max_attempts: u64,
    /// Backoff between attempts.
    pub backoff: BackoffConfig,
}

impl Default for RetrierConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetrierConfig {
    /// Reject zero attempts and inverted backoff bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        self.backoff.validate()
    }

    /// Build a retrier that treats every error as retriable.
    ///
    /// Add a predicate afterwards with [`Retrier::with_retriable`].
    pub fn into_retrier<E: 'static>(self) -> Result<Retrier<E>, ConfigError> {
        self.validate()?;
        Ok(Retrier::new()
            .with_max_attempts(self.max_attempts)
            .with_backoff(self.backoff))
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_default_config_matches_retrier_defaults() {
        let config = RetrierConfig::default();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(
            config.backoff,
            BackoffConfig::DecorrelatedExponential {
                min_wait: Duration::from_millis(500),
                max_wait: Duration::from_secs(60),
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = RetrierConfig {
            max_attempts: 0,
            ..RetrierConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroAttempts));
        assert!(config.into_retrier::<String>().is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let backoff = BackoffConfig::Exponential {
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(1),
            jitter: false,
        };
        assert!(matches!(
            backoff.validate(),
            Err(ConfigError::InvertedBounds { .. })
        ));

        let backoff = BackoffConfig::DecorrelatedExponential {
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(1),
        };
        assert!(backoff.validate().is_err());
    }

    #[test]
    fn test_into_retrier_applies_attempts() {
        let config = RetrierConfig {
            max_attempts: 4,
            backoff: BackoffConfig::None,
        };
        let retrier = config.into_retrier::<&str>().unwrap();
        assert_eq!(retrier.max_attempts(), 4);

        let mut calls = 0;
        let result: Result<(), &str> = retrier.run(|| {
            calls += 1;
            Err("down")
        });
        assert_eq!(result, Err("down"));
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_fixed_config_builds_fixed_backoff() {
        let config = BackoffConfig::Fixed {
            wait: Duration::from_millis(1),
        };
        let mut backoff = config.new_backoff();
        backoff.backoff(0);
        assert!(config.validate().is_ok());
    }
}
