//! # SeaingClearly Server
//!
//! Entry point for the image-enhancement backend.
//!
//! ## Startup Sequence
//!
//! 1. Install the tracing subscriber (`RUST_LOG`, default `info`)
//! 2. Load configuration from the environment
//! 3. Build the gateway service (validates config, starts workers)
//! 4. Serve until Ctrl+C, then drain in-flight requests
//!
//! ## Environment
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `API_SECRET` | yes | |
//! | `UUID_NAMESPACE` | yes | |
//! | `HOST` | no | `0.0.0.0` |
//! | `PORT` | no | `5000` |
//! | `SC_WORKERS` | no | CPU count |
//! | `SC_QUEUE_DEPTH` | no | `64` |
//! | `SC_MAX_UPLOAD_BYTES` | no | 16 MiB |

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use sc_03_api_gateway::{ApiGatewayService, GatewayConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

/// Load configuration through `var`, normally `std::env::var`.
fn load_config<F>(var: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = GatewayConfig::default();

    config.api_secret = match var("API_SECRET") {
        Some(secret) if !secret.is_empty() => secret,
        _ => bail!("API_SECRET must be set"),
    };

    let namespace = var("UUID_NAMESPACE").context("UUID_NAMESPACE must be set")?;
    config.uuid_namespace = Uuid::parse_str(namespace.trim())
        .with_context(|| format!("UUID_NAMESPACE is not a valid UUID: {namespace}"))?;

    if let Some(host) = parse_var(&var, "HOST")? {
        config.host = host;
    }
    if let Some(port) = parse_var(&var, "PORT")? {
        config.port = port;
    }
    if let Some(workers) = parse_var(&var, "SC_WORKERS")? {
        config.workers = workers;
    }
    if let Some(depth) = parse_var(&var, "SC_QUEUE_DEPTH")? {
        config.queue_depth = depth;
    }
    if let Some(limit) = parse_var(&var, "SC_MAX_UPLOAD_BYTES")? {
        config.max_upload_bytes = limit;
    }

    Ok(config)
}

fn parse_var<F, T>(var: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{name} has an invalid value: {raw}"))
        })
        .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(|name| std::env::var(name).ok())?;
    info!(?config, "Configuration loaded");

    let service = ApiGatewayService::new(config).context("failed to start gateway")?;

    info!("Server is running. Press Ctrl+C to stop.");
    service
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await
        .context("gateway stopped with an error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const NAMESPACE: &str = "8a0f6c52-3f4e-4d1b-9b0e-5a7c2d9e1f00";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_required_vars_only() {
        let config = load_config(env(&[
            ("API_SECRET", "s3cret"),
            ("UUID_NAMESPACE", NAMESPACE),
        ]))
        .unwrap();

        assert_eq!(config.api_secret, "s3cret");
        assert_eq!(config.uuid_namespace.to_string(), NAMESPACE);
        assert_eq!(config.port, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = load_config(env(&[
            ("API_SECRET", "s3cret"),
            ("UUID_NAMESPACE", NAMESPACE),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("SC_WORKERS", "3"),
            ("SC_QUEUE_DEPTH", "10"),
            ("SC_MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_depth, 10);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_missing_secret() {
        assert!(load_config(env(&[("UUID_NAMESPACE", NAMESPACE)])).is_err());
        assert!(load_config(env(&[("API_SECRET", ""), ("UUID_NAMESPACE", NAMESPACE)])).is_err());
    }

    #[test]
    fn test_bad_namespace() {
        let err = load_config(env(&[("API_SECRET", "s"), ("UUID_NAMESPACE", "nope")]))
            .unwrap_err();
        assert!(err.to_string().contains("UUID_NAMESPACE"));
        assert!(load_config(env(&[("API_SECRET", "s")])).is_err());
    }

    #[test]
    fn test_unparsable_port() {
        let err = load_config(env(&[
            ("API_SECRET", "s"),
            ("UUID_NAMESPACE", NAMESPACE),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
