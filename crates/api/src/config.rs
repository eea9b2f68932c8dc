use adslot_engine::EngineConfig;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::jwt::JwtConfig;

/// Value of `APP_ENV` that forbids the scheduler auth bypass.
pub const ENV_PRODUCTION: &str = "production";

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight background work after the listener stops.
    pub shutdown_timeout_secs: u64,
    /// Deployment environment name (default: `development`).
    pub app_env: String,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Credentials for the sweep trigger.
    pub scheduler: SchedulerConfig,
    /// Engine tunables (transaction budget, sweep batch size, cache TTL).
    pub engine: EngineConfig,
    /// Interval of the in-process sweep loop in seconds (default: `3600`).
    pub sweep_interval_secs: u64,
    /// Run the sweep loop inside the API process (default: `false`).
    pub sweep_in_process: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                    |
    /// | `APP_ENV`                | `development`           |
    /// | `SCHEDULER_TOKEN`        | --                      |
    /// | `SCHEDULER_AUTH_BYPASS`  | `false`                 |
    /// | `SWEEP_INTERVAL_SECS`    | `3600`                  |
    /// | `SWEEP_IN_PROCESS`       | `false`                 |
    ///
    /// Engine variables are documented on [`EngineConfig::from_env`], JWT
    /// variables on [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on unparseable values and when the scheduler bypass is enabled
    /// in production.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        let sweep_interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("SWEEP_INTERVAL_SECS must be a valid u64");
        assert!(sweep_interval_secs > 0, "SWEEP_INTERVAL_SECS must be positive");

        let sweep_in_process = env_flag("SWEEP_IN_PROCESS");

        let scheduler = SchedulerConfig::new(
            std::env::var("SCHEDULER_TOKEN").ok().as_deref(),
            env_flag("SCHEDULER_AUTH_BYPASS"),
            &app_env,
        )
        .unwrap_or_else(|e| panic!("{e}"));

        let jwt = JwtConfig::from_env();
        let engine = EngineConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            app_env,
            jwt,
            scheduler,
            engine,
            sweep_interval_secs,
            sweep_in_process,
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env == ENV_PRODUCTION
    }
}

/// Parse a boolean env var. Accepts `1`/`true`/`yes`, case-insensitive.
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Scheduler credentials
// ---------------------------------------------------------------------------

/// Credentials accepted by the sweep endpoint.
///
/// Only the SHA-256 digest of the configured token is kept in memory.
#[derive(Clone)]
pub struct SchedulerConfig {
    token_digest: Option<[u8; 32]>,
    /// Skip the token check entirely. Never allowed in production.
    pub bypass: bool,
}

impl std::fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("token_configured", &self.token_digest.is_some())
            .field("bypass", &self.bypass)
            .finish()
    }
}

impl SchedulerConfig {
    /// Build scheduler credentials, rejecting a bypass in production.
    ///
    /// An empty token is treated as unset.
    pub fn new(token: Option<&str>, bypass: bool, app_env: &str) -> Result<Self, String> {
        if bypass && app_env == ENV_PRODUCTION {
            return Err("SCHEDULER_AUTH_BYPASS must not be enabled when APP_ENV=production".into());
        }

        let token_digest = token.map(str::trim).filter(|t| !t.is_empty()).map(digest);
        if token_digest.is_none() && !bypass {
            tracing::warn!("SCHEDULER_TOKEN is not set; the sweep endpoint will reject all callers");
        }

        Ok(Self {
            token_digest,
            bypass,
        })
    }

    /// Whether `presented` matches the configured token.
    ///
    /// Digests are compared in constant time. Always `false` when no token
    /// is configured.
    pub fn verify(&self, presented: &str) -> bool {
        match &self.token_digest {
            Some(expected) => bool::from(expected.as_slice().ct_eq(digest(presented).as_slice())),
            None => false,
        }
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}
