use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::screening::service::DEFAULT_IDLE_TIMEOUT_MINUTES;
use crate::screening::{CatalogError, QuestionCatalog, RiskTierTable, TierTableError};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the screening service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub quiz: QuizDataConfig,
    pub sessions: SessionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let idle_minutes = match env::var("APP_SESSION_IDLE_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .ok_or(ConfigError::InvalidIdleTimeout)?,
            Err(_) => DEFAULT_IDLE_TIMEOUT_MINUTES,
        };

        let questions_path = optional_path("APP_QUESTIONS_PATH");
        let risk_tiers_path = optional_path("APP_RISK_TIERS_PATH");

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            quiz: QuizDataConfig {
                questions_path,
                risk_tiers_path,
            },
            sessions: SessionConfig { idle_minutes },
        })
    }
}

fn optional_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the question catalog and risk tier table come from.
/// Unset paths fall back to the seed data bundled with the crate.
#[derive(Debug, Clone, Default)]
pub struct QuizDataConfig {
    pub questions_path: Option<PathBuf>,
    pub risk_tiers_path: Option<PathBuf>,
}

impl QuizDataConfig {
    pub fn load_catalog(&self) -> Result<QuestionCatalog, CatalogError> {
        match &self.questions_path {
            Some(path) => QuestionCatalog::from_path(path),
            None => QuestionCatalog::bundled(),
        }
    }

    pub fn load_tiers(&self) -> Result<RiskTierTable, TierTableError> {
        match &self.risk_tiers_path {
            Some(path) => RiskTierTable::from_path(path),
            None => RiskTierTable::bundled(),
        }
    }
}

/// Lifetime of in-memory quiz sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub idle_minutes: u32,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.idle_minutes))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidIdleTimeout,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidIdleTimeout => {
                write!(f, "APP_SESSION_IDLE_MINUTES must be a positive whole number")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidIdleTimeout => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_QUESTIONS_PATH",
            "APP_RISK_TIERS_PATH",
            "APP_SESSION_IDLE_MINUTES",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.quiz.questions_path.is_none());
        assert!(config.quiz.risk_tiers_path.is_none());
        assert_eq!(config.sessions.idle_minutes, 30);
    }

    #[test]
    fn session_idle_timeout_must_be_positive() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_SESSION_IDLE_MINUTES", "0");
        let err = AppConfig::load().expect_err("zero minutes rejected");
        assert!(matches!(err, ConfigError::InvalidIdleTimeout));

        env::set_var("APP_SESSION_IDLE_MINUTES", "5");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.sessions.idle_timeout(), chrono::Duration::minutes(5));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_port() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PORT", "eighty");
        let err = AppConfig::load().expect_err("port must be numeric");
        assert!(matches!(err, ConfigError::InvalidPort));
        reset_env();
    }

    #[test]
    fn blank_data_paths_fall_back_to_bundled_seed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_QUESTIONS_PATH", "  ");
        env::set_var("APP_RISK_TIERS_PATH", "/srv/tiers.csv");
        let config = AppConfig::load().expect("config loads");
        assert!(config.quiz.questions_path.is_none());
        assert_eq!(
            config.quiz.risk_tiers_path,
            Some(PathBuf::from("/srv/tiers.csv"))
        );
        reset_env();

        let catalog = QuizDataConfig::default()
            .load_catalog()
            .expect("bundled catalog");
        assert!(!catalog.general().is_empty());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }
}
