//! Typed application configuration.
//!
//! Loading follows an env/dotenv/file precedence, but typed
//! instead of a flat string map: defaults, then an optional TOML file,
//! then `ATRIUM_*` environment variables, each layer only overriding the
//! fields it actually sets. The small CLI-exposed subset (bind address,
//! config file path, database url) is additionally reachable via `clap`
//! flags for local/ad-hoc runs.

use std::env;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub request_body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            request_body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub hmac_secret: String,
    pub clock_skew_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hmac_secret: String::new(),
            clock_skew_seconds: 60,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/atrium".to_string(),
            max_connections: 10,
        }
    }
}

/// Agent Bus defaults: concurrency is clamped 1-10 per agent
/// regardless of what a caller requests; retries use capped exponential
/// backoff.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub default_concurrency_limit: u32,
    pub queue_capacity_per_agent: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub cancel_grace_seconds: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_concurrency_limit: 4,
            queue_capacity_per_agent: 64,
            retry_max_attempts: 3,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 4_000,
            cancel_grace_seconds: 2,
        }
    }
}

/// Outbox publisher cadence.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub poll_interval_ms: u64,
    pub claim_batch_size: u32,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            claim_batch_size: 50,
            retry_max_attempts: 8,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 30_000,
        }
    }
}

/// Stream Manager ring buffer and heartbeat cadence.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub ring_buffer_capacity: usize,
    pub ring_buffer_ttl_seconds: u64,
    pub reader_queue_capacity: usize,
    pub heartbeat_interval_seconds: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ring_buffer_capacity: 1_000,
            ring_buffer_ttl_seconds: 3_600,
            reader_queue_capacity: 256,
            heartbeat_interval_seconds: 30,
        }
    }
}

/// Approval Manager timeout policy.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub medium_risk_timeout_seconds: u64,
    pub high_risk_timeout_seconds: u64,
    pub plan_timeout_seconds: u64,
    pub warning_before_timeout_seconds: u64,
    pub max_retries_per_session: u32,
    pub retry_cooldown_seconds: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            medium_risk_timeout_seconds: 300,
            high_risk_timeout_seconds: 600,
            plan_timeout_seconds: 300,
            warning_before_timeout_seconds: 60,
            max_retries_per_session: 3,
            retry_cooldown_seconds: 10,
        }
    }
}

/// Tool Mediation validation limits.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub max_param_bytes: usize,
    pub max_execution_seconds: u64,
    /// Largest `result` payload a client may post back for a tool execution
    /// (bounds `execute_command` output in particular).
    pub max_result_bytes: usize,
    pub command_allow_list: Vec<String>,
    pub command_deny_list: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_param_bytes: 64 * 1024,
            max_execution_seconds: 300,
            max_result_bytes: 1024 * 1024,
            // The spec's non-destructive set: search/listing, build tooling,
            // git, and package-manager *read* paths (install subcommands are
            // denied outright, separately, regardless of this list).
            command_allow_list: vec![
                "grep", "find", "ls", "cat", "head", "tail", "wc", "echo", "date", "pwd", "whoami",
                "git", "npm", "python", "python3", "node", "pip", "pip3", "apt", "apt-get", "yum",
                "cargo", "gem", "gcc", "g++", "clang", "make", "cmake", "tar", "zip", "unzip",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            command_deny_list: vec![
                "rm".into(),
                "dd".into(),
                "mkfs".into(),
                "sudo".into(),
                "su".into(),
                "curl".into(),
                "wget".into(),
            ],
        }
    }
}

/// Defaults for the agents a new project is seeded with.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub starter_pack_model: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            starter_pack_model: "claude-default".to_string(),
        }
    }
}

/// Worker Space Registry's per-tenant agent cache: capacity is a count of
/// agents, not bytes, since the cached value is a small metadata struct.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub agent_cache_capacity: usize,
    pub agent_cache_soft_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            agent_cache_capacity: 256,
            agent_cache_soft_ttl_seconds: 300,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub bus: BusConfig,
    pub outbox: OutboxConfig,
    pub stream: StreamConfig,
    pub approval: ApprovalConfig,
    pub tools: ToolsConfig,
    pub agents: AgentsConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Loads defaults, merges an optional TOML file, then applies `ATRIUM_*`
    /// environment overrides for the handful of fields that need runtime
    /// overrides without a rebuild (secrets, bind address, database url).
    pub fn load(file_path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut cfg = match file_path {
            Some(path) => Self::from_file(path)?,
            None => AppConfig::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("ATRIUM_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = env::var("ATRIUM_HMAC_SECRET") {
            self.auth.hmac_secret = v;
        }
        if let Ok(v) = env::var("ATRIUM_DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("ATRIUM_CLOCK_SKEW_SECONDS") {
            if let Ok(parsed) = v.parse() {
                self.auth.clock_skew_seconds = parsed;
            }
        }
    }

    /// Fails closed if auth is unusable: an empty HMAC secret would make
    /// every bearer token signature trivially forgeable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.hmac_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "auth.hmac_secret".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if !(1..=10).contains(&self.bus.default_concurrency_limit) {
            return Err(ConfigError::InvalidValue {
                field: "bus.default_concurrency_limit".to_string(),
                message: "must be between 1 and 10".to_string(),
            });
        }
        Ok(())
    }
}

/// CLI-exposed configuration subset: bind address, config path,
/// database url all overridable at the command line for local runs.
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "atrium-server", about = "Multi-tenant agent platform core")]
pub struct Cli {
    #[arg(long, env = "ATRIUM_CONFIG_FILE")]
    pub config_file: Option<std::path::PathBuf>,

    #[arg(long, env = "ATRIUM_BIND_ADDR")]
    pub bind_addr: Option<String>,

    #[arg(long, env = "ATRIUM_DATABASE_URL")]
    pub database_url: Option<String>,
}

impl Cli {
    /// Loads the file/env-layered config, then applies any CLI flags as the
    /// final, highest-precedence override.
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let mut cfg = AppConfig::load(self.config_file.as_deref())?;
        if let Some(addr) = self.bind_addr {
            cfg.server.bind_addr = addr;
        }
        if let Some(url) = self.database_url {
            cfg.database.url = url;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_clamp_concurrency_within_platform_bounds() {
        let cfg = AppConfig::default();
        assert!((1..=10).contains(&cfg.bus.default_concurrency_limit));
    }

    #[test]
    fn validate_rejects_empty_hmac_secret() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_configured_secret() {
        let mut cfg = AppConfig::default();
        cfg.auth.hmac_secret = "test-secret".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_override_wins_over_file_default() {
        std::env::set_var("ATRIUM_BIND_ADDR", "127.0.0.1:9090");
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:9090");
        std::env::remove_var("ATRIUM_BIND_ADDR");
    }
}
