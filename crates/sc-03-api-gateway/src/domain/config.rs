//! Gateway configuration with validation.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use sc_01_device_auth::{AuthConfig, DEFAULT_CHALLENGE_TTL_SECS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Default bounded job queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default upload limit (16 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Main gateway configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address
    pub host: IpAddr,
    /// HTTP and WebSocket port
    pub port: u16,
    /// Pipeline worker tasks
    pub workers: usize,
    /// Jobs that may wait for a worker before submissions are refused
    pub queue_depth: usize,
    /// Lifetime of an issued challenge
    #[serde(with = "humantime_serde")]
    pub challenge_ttl: Duration,
    /// How often abandoned challenges are purged
    #[serde(with = "humantime_serde")]
    pub purge_interval: Duration,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
    /// Namespace for device UUID v5 derivation
    pub uuid_namespace: Uuid,
    /// Shared secret for challenge responses and session cookie signing
    pub api_secret: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            workers: num_cpus::get().max(1),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            challenge_ttl: Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECS),
            purge_interval: Duration::from_secs(60),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            uuid_namespace: Uuid::nil(),
            api_secret: String::new(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("workers", &self.workers)
            .field("queue_depth", &self.queue_depth)
            .field("challenge_ttl", &self.challenge_ttl)
            .field("purge_interval", &self.purge_interval)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("uuid_namespace", &self.uuid_namespace)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        if self.workers == 0 {
            return Err(ConfigError::InvalidLimit("workers cannot be 0".into()));
        }

        if self.queue_depth == 0 {
            return Err(ConfigError::InvalidLimit("queue_depth cannot be 0".into()));
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_upload_bytes cannot be 0".into(),
            ));
        }

        if self.challenge_ttl.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "challenge_ttl cannot be 0".into(),
            ));
        }

        if self.purge_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "purge_interval cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get server bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Settings for the device authenticator
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.uuid_namespace, self.api_secret.clone())
            .with_challenge_ttl(self.challenge_ttl)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The shared secret is required
    #[error("api_secret must be set")]
    MissingSecret,
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Durations as `"300s"`, `"500ms"` or `"5m"`.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(duration))
    }

    pub(super) fn format_duration(duration: &Duration) -> String {
        if duration.subsec_nanos() == 0 {
            format!("{}s", duration.as_secs())
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        GatewayConfig {
            api_secret: "s3cret".into(),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.queue_depth, 64);
        assert_eq!(config.challenge_ttl, Duration::from_secs(300));
        assert!(config.workers >= 1);
        // no secret by default
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = valid();
        config.workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));

        let mut config = valid();
        config.queue_depth = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));

        let mut config = valid();
        config.max_upload_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));

        let mut config = valid();
        config.challenge_ttl = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_parse_duration() {
        use humantime_serde::parse_duration;
        assert_eq!(parse_duration("300s"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("42"), Ok(Duration::from_secs(42)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_sub_second_durations_survive_serialization() {
        use humantime_serde::format_duration;
        assert_eq!(format_duration(&Duration::from_secs(300)), "300s");
        assert_eq!(format_duration(&Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(&Duration::from_millis(1_250)), "1250ms");

        let mut config = valid();
        config.purge_interval = Duration::from_millis(500);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["purge_interval"], "500ms");
        assert_eq!(value["challenge_ttl"], "300s");

        let restored: GatewayConfig = serde_json::from_value(value).unwrap();
        assert_eq!(restored.purge_interval, Duration::from_millis(500));
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GatewayConfig = serde_json::from_value(serde_json::json!({
            "port": 8080,
            "challenge_ttl": "120s",
            "api_secret": "x"
        }))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.challenge_ttl, Duration::from_secs(120));
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
    }
}
