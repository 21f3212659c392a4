//! Process environment loader, modeled on the original `internal/pkg/config/env.go`.
//!
//! Every field has a sane development default except the secrets
//! (`database_dsn`, `jwt_secret`, `apify_api_token`, `openai_api_key`), which
//! are `None` unless set. [`PilotEnv::validate_required`] enforces the
//! per-binary required subset named in §6 of the spec.

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Identifies which binary is loading the environment, for error messages
/// and for selecting the required-key subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceName {
    Worker,
    Scheduler,
    Listener,
}

impl ServiceName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Worker => "worker",
            ServiceName::Scheduler => "scheduler",
            ServiceName::Listener => "listener",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PilotEnv {
    pub environment: String,
    pub database_dsn: Option<String>,
    pub database_max_idle_conns: u32,
    pub database_max_open_conns: u32,
    pub database_conn_max_lifetime: Duration,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,
    pub jwt_secret: Option<String>,
    pub jwt_access_expire_secs: i64,
    pub apify_api_token: Option<String>,
    pub openai_api_key: Option<String>,
    /// Explicit provider selection (spec §9 OQ4) — `openai` | `deepseek`.
    /// Never inferred from the shape of `openai_api_key`.
    pub llm_provider: String,
    pub worker_concurrency: usize,
    pub scheduler_product_update_interval: String,
    pub dashboard_port: u16,
}

impl PilotEnv {
    /// Load from process environment, applying the documented defaults.
    pub fn load() -> Self {
        let redis_host = env_or("REDIS_HOST", "localhost");
        let redis_port: u16 = env_or("REDIS_PORT", "6379").parse().unwrap_or(6379);

        Self {
            environment: env_or("ENVIRONMENT", "development"),
            database_dsn: non_empty_env("DATABASE_DSN"),
            database_max_idle_conns: env_as("DATABASE_MAX_IDLE_CONNS", 10),
            database_max_open_conns: env_as("DATABASE_MAX_OPEN_CONNS", 100),
            database_conn_max_lifetime: Duration::from_secs(env_as(
                "DATABASE_CONN_MAX_LIFETIME",
                3600,
            )),
            redis_host,
            redis_port,
            redis_db: env_as("REDIS_DB", 0),
            jwt_secret: non_empty_env("JWT_SECRET"),
            jwt_access_expire_secs: env_as("JWT_ACCESS_EXPIRE", 86400),
            apify_api_token: non_empty_env("APIFY_API_TOKEN"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            llm_provider: env_or("LLM_PROVIDER", "deepseek"),
            worker_concurrency: env_as("WORKER_CONCURRENCY", 10),
            scheduler_product_update_interval: env_or(
                "SCHEDULER_PRODUCT_UPDATE_INTERVAL",
                "@every 1h",
            ),
            dashboard_port: env_as("DASHBOARD_PORT", 5555),
        }
    }

    pub fn redis_addr(&self) -> String {
        format!("{}:{}", self.redis_host, self.redis_port)
    }

    /// Verify the required subset of config for `service` is present.
    /// Matches the original's `ValidateRequired`: an unknown key is ignored
    /// rather than treated as missing, so callers can pass a superset list.
    pub fn validate_required(&self, service: ServiceName, required: &[&str]) -> Result<()> {
        for key in required {
            let present = match *key {
                "DATABASE_DSN" => self.database_dsn.is_some(),
                "JWT_SECRET" => self.jwt_secret.is_some(),
                "APIFY_API_TOKEN" => self.apify_api_token.is_some(),
                "OPENAI_API_KEY" => self.openai_api_key.is_some(),
                "DASHBOARD_PORT" => true, // always defaulted
                _ => continue,
            };
            if !present {
                return Err(anyhow!(
                    "{key} environment variable is required for {} service",
                    service.as_str()
                ));
            }
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_as<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("WORKER_CONCURRENCY");
        std::env::remove_var("REDIS_HOST");
        let env = PilotEnv::load();
        assert_eq!(env.worker_concurrency, 10);
        assert_eq!(env.redis_host, "localhost");
        assert_eq!(env.redis_addr(), "localhost:6379");
    }

    #[test]
    fn validate_required_fails_on_missing_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("APIFY_API_TOKEN");
        let env = PilotEnv::load();
        let err = env
            .validate_required(ServiceName::Worker, &["APIFY_API_TOKEN"])
            .unwrap_err();
        assert!(err.to_string().contains("APIFY_API_TOKEN"));
    }

    #[test]
    fn validate_required_passes_when_present() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("APIFY_API_TOKEN", "tok_123");
        let env = PilotEnv::load();
        assert!(env
            .validate_required(ServiceName::Worker, &["APIFY_API_TOKEN"])
            .is_ok());
        std::env::remove_var("APIFY_API_TOKEN");
    }

    #[test]
    fn unknown_required_key_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        let env = PilotEnv::load();
        assert!(env
            .validate_required(ServiceName::Scheduler, &["NOT_A_REAL_KEY"])
            .is_ok());
    }
}
