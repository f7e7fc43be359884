use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// When absent the service runs against the in-memory stores.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_seat_hold_seconds")]
    pub seat_hold_seconds: u64,
    #[serde(default = "default_authorization_ttl_seconds")]
    pub authorization_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_seat_hold_seconds() -> u64 {
    600
}

fn default_authorization_ttl_seconds() -> u64 {
    900
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_currency() -> String {
    odi_shared::DEFAULT_CURRENCY.to_string()
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            seat_hold_seconds: default_seat_hold_seconds(),
            authorization_ttl_seconds: default_authorization_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            default_currency: default_currency(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Environment overrides, e.g. ODI__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("ODI").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
