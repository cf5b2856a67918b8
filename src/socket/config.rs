//! Socket configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default inbound high watermark (1 MiB)
pub const DEFAULT_READ_HIGH_WATERMARK: usize = 1024 * 1024;

/// Default inbound low watermark (256 KiB)
pub const DEFAULT_READ_LOW_WATERMARK: usize = 256 * 1024;

/// What the socket does with failures reported by the transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log dial and write failures and keep going. A failed dial leaves
    /// pending writes waiting; a failed write still completes successfully.
    #[default]
    Absorb,
    /// Fail the affected writes with a typed error
    Propagate,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absorb => write!(f, "absorb"),
            Self::Propagate => write!(f, "propagate"),
        }
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "absorb" => Ok(Self::Absorb),
            "propagate" => Ok(Self::Propagate),
            _ => Err(Error::Config(format!(
                "invalid error policy '{}': expected absorb or propagate",
                s
            ))),
        }
    }
}

/// Per-socket configuration
///
/// Durations are (de)serialized as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Give up on a dial that has not connected after this long (default: wait forever)
    #[serde(rename = "dial_timeout_ms", with = "opt_millis")]
    pub dial_timeout: Option<Duration>,
    /// Fail a write that has not completed after this long (default: wait forever)
    #[serde(rename = "write_timeout_ms", with = "opt_millis")]
    pub write_timeout: Option<Duration>,
    /// Handling of transport-reported dial and write failures
    pub error_policy: ErrorPolicy,
    /// Buffered inbound bytes above which the transport is asked to pause
    pub read_high_watermark: usize,
    /// Buffered inbound bytes at or below which a paused transport is resumed
    pub read_low_watermark: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            dial_timeout: None,
            write_timeout: None,
            error_policy: ErrorPolicy::default(),
            read_high_watermark: DEFAULT_READ_HIGH_WATERMARK,
            read_low_watermark: DEFAULT_READ_LOW_WATERMARK,
        }
    }
}

impl SocketConfig {
    /// Create a builder starting from the defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use ziti_wire::socket::{ErrorPolicy, SocketConfig};
    ///
    /// let config = SocketConfig::builder()
    ///     .dial_timeout(Duration::from_secs(10))
    ///     .error_policy(ErrorPolicy::Propagate)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.dial_timeout, Some(Duration::from_secs(10)));
    /// ```
    pub fn builder() -> SocketConfigBuilder {
        SocketConfigBuilder {
            config: SocketConfig::default(),
        }
    }

    /// Parse a JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SocketConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants between fields
    pub fn validate(&self) -> Result<()> {
        if self.read_high_watermark == 0 {
            return Err(Error::Config("read_high_watermark must be positive".into()));
        }
        if self.read_low_watermark > self.read_high_watermark {
            return Err(Error::Config(format!(
                "read_low_watermark ({}) exceeds read_high_watermark ({})",
                self.read_low_watermark, self.read_high_watermark
            )));
        }
        if self.dial_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("dial_timeout must be non-zero".into()));
        }
        if self.write_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("write_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for [`SocketConfig`]
#[derive(Debug, Clone)]
pub struct SocketConfigBuilder {
    config: SocketConfig,
}

impl SocketConfigBuilder {
    /// Set the dial timeout
    pub fn dial_timeout(mut self, duration: Duration) -> Self {
        self.config.dial_timeout = Some(duration);
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, duration: Duration) -> Self {
        self.config.write_timeout = Some(duration);
        self
    }

    /// Set the error policy
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.config.error_policy = policy;
        self
    }

    /// Set both inbound watermarks
    pub fn read_watermarks(mut self, low: usize, high: usize) -> Self {
        self.config.read_low_watermark = low;
        self.config.read_high_watermark = high;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SocketConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
