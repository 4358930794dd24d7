//! Typed configuration structs loaded from the environment.

use super::env_keys::host as host_keys;
use super::env_keys::observability as obv_keys;
use super::loader::{env_bool, env_optional, env_or};

/// Default tracing filter when `ENVSTRAP_LOG_LEVEL` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "envstrap=info";

/// Observability settings: quiet, log_level, log_json, audit_log.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    /// Cached for the lifetime of the process (loads `.env` on first call).
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self::read_env()
        })
    }

    /// Uncached read, without `.env` loading.
    pub fn read_env() -> Self {
        Self {
            quiet: env_bool(obv_keys::ENVSTRAP_QUIET, obv_keys::QUIET_ALIASES, false),
            log_level: env_or(
                obv_keys::ENVSTRAP_LOG_LEVEL,
                obv_keys::LOG_LEVEL_ALIASES,
                || DEFAULT_LOG_LEVEL.to_string(),
            ),
            log_json: env_bool(obv_keys::ENVSTRAP_LOG_JSON, obv_keys::LOG_JSON_ALIASES, false),
            audit_log: env_optional(obv_keys::ENVSTRAP_AUDIT_LOG, obv_keys::AUDIT_LOG_ALIASES),
        }
    }

    /// Tracing filter directive honouring quiet mode.
    pub fn filter_directive(&self) -> String {
        if self.quiet {
            "envstrap=warn".to_string()
        } else {
            self.log_level.clone()
        }
    }
}

/// Who invoked envstrap, as reported by the environment.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// `SUDO_USER`, unless empty or `root`
    pub sudo_user: Option<String>,
}

impl HostConfig {
    pub fn read_env() -> Self {
        Self {
            sudo_user: env_optional(host_keys::SUDO_USER, &[]).filter(|u| u != "root"),
        }
    }
}
