use crate::auth::password::DEFAULT_ITERATIONS;
use crate::auth::token::DEFAULT_TOKEN_TTL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, built once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where this config was read from. Not serialized.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Fallback filter when `RUST_LOG` is unset (`info`, `cardsorter=debug`, ...).
    pub log_level: String,

    pub http: HttpConfig,
    pub rpc: RpcConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            log_level: "info".into(),
            http: HttpConfig::default(),
            rpc: RpcConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

// ── HTTP gateway ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Requests running longer than this are answered with 408.
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            request_timeout_secs: 30,
            max_body_bytes: 65_536,
        }
    }
}

// ── RPC transport ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_bytes: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9090,
            max_frame_bytes: crate::rpc::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

// ── Database ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = directories::BaseDirs::new()
            .map(|dirs| dirs.data_dir().join("cardsorter").join("cardsorter.db"))
            .unwrap_or_else(|| PathBuf::from("cardsorter.db"));
        Self { path }
    }
}

// ── Auth ─────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for session tokens; at least 32 bytes.
    pub signing_key: String,
    /// Pre-shared secrets accepted on device-authenticated operations.
    pub device_secrets: Vec<String>,
    pub token_ttl_secs: u64,
    /// PBKDF2 rounds for newly hashed passwords.
    pub password_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            device_secrets: Vec::new(),
            token_ttl_secs: DEFAULT_TOKEN_TTL.as_secs(),
            password_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.signing_key.is_empty() {
            "[unset]"
        } else {
            "[redacted]"
        };
        f.debug_struct("AuthConfig")
            .field("signing_key", &key)
            .field(
                "device_secrets",
                &format_args!("[{} redacted]", self.device_secrets.len()),
            )
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("password_iterations", &self.password_iterations)
            .finish()
    }
}
