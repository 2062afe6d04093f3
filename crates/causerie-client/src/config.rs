//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client starts with zero
//! configuration for local development.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding the local database.
    /// Env: `CAUSERIE_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Tracing filter used when `RUST_LOG` is unset.
    /// Env: `CAUSERIE_LOG`
    /// Default: `causerie=debug,info`
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_filter: "causerie=debug,info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CAUSERIE_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(filter) = std::env::var("CAUSERIE_LOG") {
            if !filter.is_empty() {
                config.log_filter = filter;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Initialize the global tracing subscriber (respects `RUST_LOG`).
pub fn init_tracing(config: &ClientConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
