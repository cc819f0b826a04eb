//! Type-safe configuration with validation.
//!
//! Connection tuning and resilience settings are supplied by the host
//! service's configuration loading; this module defines the validated
//! shapes plus environment-variable constructors for the connection knobs.

use gateway_common::HttpConfig;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A numeric knob was zero or otherwise out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Environment variable parse error.
    #[error("failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name.
        name: String,
        /// Parse failure description.
        reason: String,
    },
}

/// Per-provider connection tuning for outbound clients.
#[derive(Debug, Clone)]
pub struct ProviderConnectionConfig {
    /// Maximum idle connections kept per route/host.
    pub max_idle_per_host: usize,
    /// Inactivity threshold after which idle connections are probed for
    /// liveness (TCP keep-alive interval).
    pub validate_after_inactivity: Duration,
    /// Connection-request/total timeout for one exchange.
    pub request_timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Socket read timeout.
    pub socket_timeout: Duration,
}

impl Default for ProviderConnectionConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            validate_after_inactivity: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderConnectionConfig {
    /// Loads the connection config from `PROVIDERS_CONNECTION_*`
    /// environment variables, falling back to defaults per knob.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but unparseable, or the
    /// resulting config fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_idle_per_host: env_parse(
                "PROVIDERS_CONNECTION_MAX_IDLE_PER_HOST",
                defaults.max_idle_per_host,
            )?,
            validate_after_inactivity: env_parse_secs(
                "PROVIDERS_CONNECTION_VALIDATE_AFTER_INACTIVITY_SECS",
                defaults.validate_after_inactivity,
            )?,
            request_timeout: env_parse_secs(
                "PROVIDERS_CONNECTION_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout,
            )?,
            connect_timeout: env_parse_secs(
                "PROVIDERS_CONNECTION_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            )?,
            socket_timeout: env_parse_secs(
                "PROVIDERS_CONNECTION_SOCKET_TIMEOUT_SECS",
                defaults.socket_timeout,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns an error when a knob is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_idle_per_host == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_idle_per_host",
                reason: "must be greater than 0".into(),
            });
        }
        for (field, value) in [
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
            ("socket_timeout", self.socket_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than 0".into(),
                });
            }
        }
        Ok(())
    }

    /// Derives the base HTTP config for a client, with `default_keep_alive`
    /// bounding idle-connection reuse.
    #[must_use]
    pub fn http_config(&self, default_keep_alive: Duration) -> HttpConfig {
        HttpConfig::default()
            .with_request_timeout(self.request_timeout)
            .with_connect_timeout(self.connect_timeout)
            .with_read_timeout(self.socket_timeout)
            .with_pool_config(default_keep_alive, self.max_idle_per_host)
            .with_tcp_keepalive(self.validate_after_inactivity)
    }
}

/// Resilience settings for one breaker bundle.
#[derive(Debug, Clone)]
pub struct ResilienceSettings {
    /// Failure rate (percent of the rolling window) that opens the circuit.
    pub failure_rate_threshold: f32,
    /// Slow-call rate (percent) that opens the circuit.
    pub slow_call_rate_threshold: f32,
    /// Calls at least this slow count as slow.
    pub slow_call_duration: Duration,
    /// Rolling window size in calls.
    pub sliding_window_size: usize,
    /// Minimum recorded calls before rates are evaluated.
    pub minimum_calls: usize,
    /// How long an open circuit waits before probing recovery.
    pub wait_in_open: Duration,
    /// Trial calls permitted while half-open.
    pub half_open_permits: usize,
    /// Concurrent executions allowed by the bulkhead.
    pub max_concurrent_calls: usize,
    /// Callers allowed to wait for a bulkhead slot before rejection.
    pub queue_capacity: usize,
    /// Hard deadline for one wrapped call.
    pub call_timeout: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration: Duration::from_secs(60),
            sliding_window_size: 100,
            minimum_calls: 10,
            wait_in_open: Duration::from_secs(60),
            half_open_permits: 3,
            max_concurrent_calls: 25,
            queue_capacity: 50,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl ResilienceSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error when a count knob is zero or a rate is outside
    /// (0, 100].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("sliding_window_size", self.sliding_window_size),
            ("minimum_calls", self.minimum_calls),
            ("half_open_permits", self.half_open_permits),
            ("max_concurrent_calls", self.max_concurrent_calls),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than 0".into(),
                });
            }
        }
        for (field, rate) in [
            ("failure_rate_threshold", self.failure_rate_threshold),
            ("slow_call_rate_threshold", self.slow_call_rate_threshold),
        ] {
            if !(rate > 0.0 && rate <= 100.0) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be within (0, 100]".into(),
                });
            }
        }
        Ok(())
    }
}

/// Per provider+command resilience configuration with a global default.
///
/// Specific settings are registered under `"{provider}-{command}"` (the
/// provider name normalized, underscores stripped); lookups fall back to
/// the default configuration when no specific one is registered.
#[derive(Debug, Clone)]
pub struct ResilienceConfigRegistry {
    configs: HashMap<String, ResilienceSettings>,
    default: ResilienceSettings,
}

impl ResilienceConfigRegistry {
    /// Creates a registry with the given default settings.
    #[must_use]
    pub fn new(default: ResilienceSettings) -> Self {
        Self {
            configs: HashMap::new(),
            default,
        }
    }

    /// Registers specific settings for a `"{provider}-{command}"` key.
    pub fn register(&mut self, config_key: impl Into<String>, settings: ResilienceSettings) {
        self.configs.insert(config_key.into(), settings);
    }

    /// Looks up the settings for a config key, falling back to the default.
    #[must_use]
    pub fn settings_for(&self, config_key: &str) -> &ResilienceSettings {
        self.configs.get(config_key).unwrap_or(&self.default)
    }
}

impl Default for ResilienceConfigRegistry {
    fn default() -> Self {
        Self::new(ResilienceSettings::default())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_parse_secs(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(env_parse(
        name,
        default.as_secs(),
    )?))
}
