use portal_auth::{AccountEntry, RunMode};
use serde::Deserialize;

pub const SECRET_ENV: &str = "PORTAL_JWT_SECRET";
pub const MODE_ENV: &str = "PORTAL_MODE";

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct AuthConfig {
    /// Token signing secret. `PORTAL_JWT_SECRET` overrides it.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

pub fn load(path: &str) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("failed to parse config {path}: {e}, using defaults");
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!("failed to read config {path}: {e}, using defaults");
            Config::default()
        }
    }
}

/// Apply environment overrides on top of the file config.
pub fn apply_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(secret) = lookup(SECRET_ENV).filter(|s| !s.trim().is_empty()) {
        config.auth.secret = Some(secret);
    }

    if let Some(mode) = lookup(MODE_ENV) {
        match mode.parse::<RunMode>() {
            Ok(mode) => config.auth.mode = mode,
            Err(e) => tracing::warn!("ignoring {MODE_ENV}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::Role;

    const SAMPLE: &str = r#"
        [server]
        bind = "127.0.0.1"
        port = 8080

        [auth]
        secret = "file-secret"
        mode = "development"

        [[auth.accounts]]
        username = "admin"
        password_hash = "$argon2id$v=19$m=1024,t=1,p=1$c2FsdHNhbHQ$aGFzaA"
        user_id = 1
        role = "admin"
    "#;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.secret.as_deref(), Some("file-secret"));
        assert_eq!(config.auth.mode, RunMode::Development);
        assert_eq!(config.auth.accounts.len(), 1);
        assert_eq!(config.auth.accounts[0].role, Role::Admin);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.mode, RunMode::Production);
        assert!(config.auth.secret.is_none());
        assert!(config.auth.accounts.is_empty());
    }

    #[test]
    fn env_overrides_file() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        apply_env(&mut config, |key| match key {
            SECRET_ENV => Some("env-secret".into()),
            MODE_ENV => Some("production".into()),
            _ => None,
        });
        assert_eq!(config.auth.secret.as_deref(), Some("env-secret"));
        assert_eq!(config.auth.mode, RunMode::Production);
    }

    #[test]
    fn blank_or_invalid_env_is_ignored() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        apply_env(&mut config, |key| match key {
            SECRET_ENV => Some("  ".into()),
            MODE_ENV => Some("staging".into()),
            _ => None,
        });
        assert_eq!(config.auth.secret.as_deref(), Some("file-secret"));
        assert_eq!(config.auth.mode, RunMode::Development);
    }

    #[test]
    fn shipped_example_is_production_without_accounts() {
        let config: Config = toml::from_str(include_str!("../../../config.example.toml")).unwrap();
        assert_eq!(config.auth.mode, RunMode::Production);
        assert!(config.auth.secret.is_none());
        assert!(config.auth.accounts.is_empty());
        assert!(portal_auth::resolve_secret(None, config.auth.mode).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let config = load("/nonexistent/portal.toml");
        assert_eq!(config.server.bind, "0.0.0.0");
    }
}
