use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api/v1";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub billing: BillingConfig,
    pub cron: CronConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub additional_base_paths: Vec<String>,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub ttl_seconds: i64,
    pub cookie_secure: bool,
}

/// Fallbacks used when no policy row has been persisted yet.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    pub default_max_failed_attempts: i32,
    pub default_lockout_minutes: i32,
    pub default_password_min_length: i32,
    pub default_require_complexity: bool,
    pub default_password_history_count: i32,
    pub default_min_password_age_days: i32,
    pub default_max_password_age_days: i32,
    pub reset_token_ttl_minutes: i64,
}

/// Tariff and due-date rules. Amounts are in minor currency units.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BillingConfig {
    pub minimum_charge: i64,
    pub minimum_consumption_m3: i32,
    pub rate_per_m3: i64,
    pub due_days: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CronConfig {
    pub auth_token: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/water_portal".to_string(),
            max_connections: 16,
            min_connections: 4,
            acquire_timeout: 5,
            run_migrations: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            allow_credentials: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            additional_base_paths: Vec::new(),
            enable_swagger: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 60 * 60 * 8,
            cookie_secure: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            default_max_failed_attempts: 5,
            default_lockout_minutes: 15,
            default_password_min_length: 8,
            default_require_complexity: true,
            default_password_history_count: 5,
            default_min_password_age_days: 0,
            default_max_password_age_days: 90,
            reset_token_ttl_minutes: 60,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            minimum_charge: 15000,
            minimum_consumption_m3: 10,
            rate_per_m3: 2500,
            due_days: 15,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Portal.toml (base configuration file)
    /// 2. Environment variables (prefixed with PORTAL_, e.g. PORTAL_DATABASE__URL)
    /// 3. DATABASE_URL environment variable
    pub fn load() -> Result<Self, figment::Error> {
        let defaults = toml::to_string(&Config::default()).map_err(|e| figment::Error::from(e.to_string()))?;

        let figment = Figment::new()
            .merge(Toml::string(&defaults))
            .merge(Toml::file("Portal.toml"))
            // Sections are separated by a double underscore, e.g. PORTAL_SECURITY__DEFAULT_LOCKOUT_MINUTES
            .merge(Env::prefixed("PORTAL_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()));

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_lockout_fallbacks() {
        let config = Config::default();
        assert_eq!(config.security.default_max_failed_attempts, 5);
        assert_eq!(config.security.default_lockout_minutes, 15);
        assert_eq!(config.security.default_password_history_count, 5);
    }

    #[test]
    fn defaults_round_trip_through_figment() {
        let defaults = toml::to_string(&Config::default()).unwrap();
        let config: Config = Figment::new().merge(Toml::string(&defaults)).extract().unwrap();
        assert_eq!(config.api.base_path, DEFAULT_API_BASE_PATH);
        assert_eq!(config.billing.due_days, 15);
    }

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORTAL_SECURITY__DEFAULT_MAX_FAILED_ATTEMPTS", "3");
            jail.set_env("DATABASE_URL", "postgres://example/db");
            let config = Config::load()?;
            assert_eq!(config.security.default_max_failed_attempts, 3);
            assert_eq!(config.database.url, "postgres://example/db");
            Ok(())
        });
    }
}
