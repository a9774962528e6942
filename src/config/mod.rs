//! Layered configuration: TOML file, then `CARDSORTER_*` environment
//! overrides, then validation. A missing file means all defaults.

pub mod schema;

pub use schema::{AuthConfig, Config, DatabaseConfig, HttpConfig, RpcConfig};

use crate::auth::token::{DEFAULT_TOKEN_TTL, MIN_SIGNING_KEY_BYTES};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("environment variable {var} has an invalid value")]
    Env { var: &'static str },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `<config dir>/cardsorter/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("cardsorter").join("config.toml"))
}

impl Config {
    /// Load from `path` (or the default location), apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let contents = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.clone(),
                    source,
                })?;
                let mut config = Self::from_toml_str(&contents).map_err(|source| {
                    ConfigError::Parse {
                        path: p.clone(),
                        source,
                    }
                })?;
                config.config_path = p.clone();
                config
            }
            Some(ref p) => {
                tracing::debug!(path = %p.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply `CARDSORTER_*` overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(level) = lookup("CARDSORTER_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(port) = lookup("CARDSORTER_HTTP_PORT") {
            self.http.port = parse_port("CARDSORTER_HTTP_PORT", &port)?;
        }
        if let Some(port) = lookup("CARDSORTER_RPC_PORT") {
            self.rpc.port = parse_port("CARDSORTER_RPC_PORT", &port)?;
        }
        if let Some(path) = lookup("CARDSORTER_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(key) = lookup("CARDSORTER_SIGNING_KEY") {
            self.auth.signing_key = key;
        }
        if let Some(secrets) = lookup("CARDSORTER_DEVICE_SECRETS") {
            self.auth.device_secrets = secrets
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.signing_key.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.signing_key is not set (try `cardsorter gen-secret`)".into(),
            ));
        }
        if self.auth.signing_key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "auth.signing_key must be at least {MIN_SIGNING_KEY_BYTES} bytes"
            )));
        }
        if self.auth.device_secrets.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "auth.device_secrets must not contain empty entries".into(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_secs must be positive".into()));
        }
        if self.auth.token_ttl_secs > DEFAULT_TOKEN_TTL.as_secs() {
            return Err(ConfigError::Invalid(format!(
                "auth.token_ttl_secs may shorten but not exceed {} seconds",
                DEFAULT_TOKEN_TTL.as_secs()
            )));
        }
        if self.auth.password_iterations == 0 {
            return Err(ConfigError::Invalid(
                "auth.password_iterations must be positive".into(),
            ));
        }
        if self.http.port == 0 || self.rpc.port == 0 {
            return Err(ConfigError::Invalid("ports must be non-zero".into()));
        }
        if self.http.port == self.rpc.port && self.http.host == self.rpc.host {
            return Err(ConfigError::Invalid(
                "http and rpc listeners must not share an address".into(),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.request_timeout_secs must be positive".into(),
            ));
        }
        if self.rpc.max_frame_bytes < 1024 {
            return Err(ConfigError::Invalid(
                "rpc.max_frame_bytes must be at least 1024".into(),
            ));
        }
        self.http_addr()?;
        self.rpc_addr()?;
        Ok(())
    }

    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("http", &self.http.host, self.http.port)
    }

    pub fn rpc_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("rpc", &self.rpc.host, self.rpc.port)
    }
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { var })
}

fn socket_addr(section: &str, host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{section}.host '{host}' is not an IP address")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn valid() -> Config {
        let mut config = Config::default();
        config.auth.signing_key = KEY.into();
        config
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.rpc.port, 9090);
        assert_eq!(config.auth.token_ttl_secs, 86_400);
        assert_eq!(config.rpc.max_frame_bytes, 1024 * 1024);
    }

    #[test]
    fn partial_toml_keeps_section_defaults() {
        let config = Config::from_toml_str(
            r#"
            log_level = "debug"

            [http]
            port = 3000

            [auth]
            signing_key = "0123456789abcdef0123456789abcdef"
            device_secrets = ["robot-1"]
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.rpc.port, 9090);
        assert_eq!(config.auth.device_secrets, ["robot-1"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_win() {
        let mut config = valid();
        config
            .apply_overrides(env(&[
                ("CARDSORTER_HTTP_PORT", "8181"),
                ("CARDSORTER_RPC_PORT", "9191"),
                ("CARDSORTER_DB_PATH", "/tmp/cards.db"),
                ("CARDSORTER_DEVICE_SECRETS", "robot-1, phone-app ,,"),
                ("CARDSORTER_LOG_LEVEL", "warn"),
            ]))
            .unwrap();
        assert_eq!(config.http.port, 8181);
        assert_eq!(config.rpc.port, 9191);
        assert_eq!(config.database.path, PathBuf::from("/tmp/cards.db"));
        assert_eq!(config.auth.device_secrets, ["robot-1", "phone-app"]);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn bad_env_port_is_rejected() {
        let mut config = valid();
        let err = config
            .apply_overrides(env(&[("CARDSORTER_HTTP_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "CARDSORTER_HTTP_PORT" }));
    }

    #[test]
    fn signing_key_is_required_and_long_enough() {
        assert!(Config::default().validate().is_err());
        let mut config = valid();
        config.auth.signing_key = "short".into();
        assert!(config.validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn token_ttl_may_only_shorten_the_default() {
        let mut config = valid();
        config.auth.token_ttl_secs = 3_600;
        assert!(config.validate().is_ok());
        config.auth.token_ttl_secs = 86_400;
        assert!(config.validate().is_ok());
        config.auth.token_ttl_secs = 86_401;
        assert!(config.validate().is_err());
        config.auth.token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_device_secret_is_rejected() {
        let mut config = valid();
        config.auth.device_secrets = vec!["robot-1".into(), "  ".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_and_shared_ports_are_rejected() {
        let mut config = valid();
        config.http.port = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.rpc.port = config.http.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn hostnames_must_be_addresses() {
        let mut config = valid();
        config.http.host = "not an ip".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = valid();
        config.auth.device_secrets = vec!["robot-secret-value".into()];
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(KEY));
        assert!(!rendered.contains("robot-secret-value"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn load_reads_file_and_records_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            format!("[auth]\nsigning_key = \"{KEY}\"\n\n[rpc]\nport = 9999\n"),
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.config_path, path);
        assert_eq!(config.rpc.port, 9999);
    }

    #[test]
    fn load_reports_parse_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[http\nport = ").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
