use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::services::booking::BookingGranularity;

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_seconds: u64,
}

// Seat-grid cache; disabled when REDIS_URL is unset
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub granularity: BookingGranularity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub idle_timeout_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = var_or(name, default);
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}

// Zero-length intervals and TTLs are refused by tokio and Redis
fn parse_nonzero_secs(name: &'static str, default: &str) -> Result<u64, ConfigError> {
    match parse_var::<u64>(name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
            reason: "must be at least 1 second".to_string(),
        }),
        secs => Ok(secs),
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("expected json or pretty, got '{}'", other)),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("expected postgres or memory, got '{}'", other)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend: StoreBackend = parse_var("STORE_BACKEND", "postgres")?;
        let url = match (backend, env::var("DATABASE_URL")) {
            (_, Ok(url)) => url,
            (StoreBackend::Memory, Err(_)) => String::new(),
            (StoreBackend::Postgres, Err(_)) => return Err(ConfigError::Missing("DATABASE_URL")),
        };

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_var("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "movie_ticket_system=debug,tower_http=debug"),
                log_format: parse_var("LOG_FORMAT", "pretty")?,
            },
            database: DatabaseConfig {
                backend,
                url,
                pool_size: parse_var("DB_POOL_SIZE", "10")?,
                acquire_timeout_seconds: parse_var("DB_ACQUIRE_TIMEOUT_SECONDS", "5")?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty()),
                seat_cache_ttl_seconds: parse_nonzero_secs("SEAT_CACHE_TTL_SECONDS", "300")?,
            },
            booking: BookingConfig {
                granularity: parse_var("BOOKING_GRANULARITY", "per-showtime")?,
            },
            sessions: SessionConfig {
                idle_timeout_seconds: parse_var("SESSION_IDLE_TIMEOUT_SECONDS", "1800")?,
                cleanup_interval_seconds: parse_nonzero_secs("SESSION_CLEANUP_INTERVAL_SECONDS", "60")?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below share the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "STORE_BACKEND",
        "DATABASE_URL",
        "BOOKING_GRANULARITY",
        "SEAT_CACHE_TTL_SECONDS",
        "SESSION_CLEANUP_INTERVAL_SECONDS",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for name in VARS {
            env::remove_var(name);
        }
        for (name, value) in vars {
            env::set_var(name, value);
        }
        let result = f();
        for name in VARS {
            env::remove_var(name);
        }
        result
    }

    #[test]
    fn parses_enum_settings() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("mysql".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn invalid_value_names_the_variable() {
        // Unset in the test environment, so the bad default is what gets parsed
        let err = parse_var::<u16>("MOVIE_TICKET_TEST_UNSET_PORT", "eighty").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("MOVIE_TICKET_TEST_UNSET_PORT"), "{message}");
        assert!(message.contains("eighty"), "{message}");
    }

    #[test]
    fn memory_backend_needs_no_database_url() {
        let config = with_env(&[("STORE_BACKEND", "memory")], Config::from_env).unwrap();
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert_eq!(config.booking.granularity, BookingGranularity::PerShowtime);
        assert_eq!(config.sessions.cleanup_interval_seconds, 60);
        assert_eq!(config.redis.seat_cache_ttl_seconds, 300);
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = with_env(&[("STORE_BACKEND", "postgres")], Config::from_env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let config = with_env(
            &[("STORE_BACKEND", "postgres"), ("DATABASE_URL", "postgres://localhost/movies")],
            Config::from_env,
        )
        .unwrap();
        assert_eq!(config.database.url, "postgres://localhost/movies");
    }

    #[test]
    fn reads_booking_granularity() {
        let config = with_env(
            &[("STORE_BACKEND", "memory"), ("BOOKING_GRANULARITY", "per-seat")],
            Config::from_env,
        )
        .unwrap();
        assert_eq!(config.booking.granularity, BookingGranularity::PerSeat);

        let err = with_env(
            &[("STORE_BACKEND", "memory"), ("BOOKING_GRANULARITY", "per-row")],
            Config::from_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BOOKING_GRANULARITY", .. }));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        for name in ["SESSION_CLEANUP_INTERVAL_SECONDS", "SEAT_CACHE_TTL_SECONDS"] {
            let err = with_env(&[("STORE_BACKEND", "memory"), (name, "0")], Config::from_env).unwrap_err();
            match err {
                ConfigError::Invalid { name: reported, .. } => assert_eq!(reported, name),
                other => panic!("expected {name} to be rejected, got {other:?}"),
            }
        }
    }
}
