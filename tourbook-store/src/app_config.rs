use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingRules,
    pub paypal: PaypalConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

/// Deployment environment. Only `Production` disables the mock refund
/// fallback, so an unset environment is treated as production and
/// development has to be opted into.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    #[default]
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_fallback_capacity")]
    pub fallback_capacity: u32,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            fallback_capacity: default_fallback_capacity(),
            default_language: default_language(),
            currency: default_currency(),
        }
    }
}

fn default_fallback_capacity() -> u32 { 10 }
fn default_language() -> String { "en".to_string() }
fn default_currency() -> String { "EUR".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Empty disables event publishing.
    #[serde(default)]
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaypalConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MailConfig {
    /// HTTP mail relay. Messages are only logged when unset.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub from: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "production".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `TOURBOOK_PAYPAL__CLIENT_ID=...` sets `paypal.client_id`
            .add_source(config::Environment::with_prefix("TOURBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
