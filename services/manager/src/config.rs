use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::store::{DbConfig, RetryPolicy};

/// Process configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub transport_listen_addr: SocketAddr,
    pub log_level: String,
    pub routing_manager_url: String,
    /// `None` runs the manager on the in-memory store.
    pub database: Option<DbConfig>,
    pub manager: ManagerSettings,
}

/// Tunables injected into the manager's components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub store_retry: RetryPolicy,
    /// Wait between shutdown phase 1 and phase 2.
    pub shutdown_timeout: Duration,
    /// Wait between dispatching a reset and reconciling its outcome.
    pub reset_settle: Duration,
    /// Age after which an unanswered setup session is dropped.
    pub session_ttl: Duration,
    pub keep_alive_interval: Duration,
    pub keep_alive_expiration: Duration,
    pub ric_plmn_id: String,
    pub ric_near_rt_id: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            store_retry: RetryPolicy::default(),
            shutdown_timeout: Duration::from_secs(5),
            reset_settle: Duration::from_millis(500),
            session_ttl: Duration::from_secs(30),
            keep_alive_interval: Duration::from_millis(1500),
            keep_alive_expiration: Duration::from_millis(4500),
            ric_plmn_id: "131014".to_string(),
            ric_near_rt_id: "556670".to_string(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for {key}: {value:?}")),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    env_or(key, default.as_millis() as u64).map(Duration::from_millis)
}

impl ManagerSettings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let store_retry = RetryPolicy {
            max_attempts: env_or("E2M_STORE_MAX_ATTEMPTS", defaults.store_retry.max_attempts)?,
            interval: env_millis("E2M_STORE_RETRY_INTERVAL_MS", defaults.store_retry.interval)?,
        };
        if store_retry.max_attempts == 0 {
            anyhow::bail!("E2M_STORE_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            store_retry,
            shutdown_timeout: Duration::from_secs(env_or(
                "E2M_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )?),
            reset_settle: env_millis("E2M_RESET_SETTLE_MS", defaults.reset_settle)?,
            session_ttl: Duration::from_secs(env_or(
                "E2M_SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )?),
            keep_alive_interval: env_millis(
                "E2M_KEEP_ALIVE_INTERVAL_MS",
                defaults.keep_alive_interval,
            )?,
            keep_alive_expiration: env_millis(
                "E2M_KEEP_ALIVE_EXPIRATION_MS",
                defaults.keep_alive_expiration,
            )?,
            ric_plmn_id: env_or("E2M_RIC_PLMN_ID", defaults.ric_plmn_id)?,
            ric_near_rt_id: env_or("E2M_RIC_NEAR_RT_ID", defaults.ric_near_rt_id)?,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = env_or("E2M_LISTEN_ADDR", SocketAddr::from(([127, 0, 0, 1], 3800)))?;

        let transport_listen_addr = env_or(
            "E2M_TRANSPORT_LISTEN_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 3801)),
        )?;

        let log_level = std::env::var("E2M_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let routing_manager_url = std::env::var("E2M_ROUTING_MANAGER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:12020".to_string());

        Ok(Self {
            listen_addr,
            transport_listen_addr,
            log_level,
            routing_manager_url,
            database: DbConfig::from_env(),
            manager: ManagerSettings::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.store_retry.max_attempts, 3);
        assert!(settings.keep_alive_expiration > settings.keep_alive_interval);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("E2M_TEST_ENV_OR_GARBAGE", "three");
        let err = env_or::<u32>("E2M_TEST_ENV_OR_GARBAGE", 3).unwrap_err();
        assert!(err.to_string().contains("E2M_TEST_ENV_OR_GARBAGE"));
        std::env::remove_var("E2M_TEST_ENV_OR_GARBAGE");
    }

    #[test]
    fn test_env_or_default_when_unset() {
        assert_eq!(env_or::<u32>("E2M_TEST_ENV_OR_UNSET", 7).unwrap(), 7);
    }
}
