use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub razorpay: RazorpayConfig,
    pub auth: AuthConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Gateway credentials. `key_secret` signs the checkout verify path,
/// `webhook_secret` signs webhook deliveries; the two are never interchangeable.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub token_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Endpoint of the notification service. Dispatch is disabled when unset.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("notify.timeout.secs", 5)?
            .add_source(config::Environment::default().separator("_").try_parsing(true))
            .build()?;

        // Manual construction due to environment variable naming
        Ok(Config {
            server: ServerConfig {
                host: config.get_string("host").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: config.get_int("port").unwrap_or(8080) as u16,
            },
            database: DatabaseConfig {
                url: config.get_string("database.url")?,
                max_connections: config.get_int("database.max.connections").unwrap_or(10) as u32,
            },
            razorpay: RazorpayConfig {
                key_id: config.get_string("razorpay.key.id")?,
                key_secret: config.get_string("razorpay.key.secret")?,
                webhook_secret: config.get_string("razorpay.webhook.secret")?,
            },
            auth: AuthConfig {
                token_secret: config.get_string("jwt.secret")?,
            },
            notifications: NotificationConfig {
                endpoint: config.get_string("notify.endpoint").ok(),
                timeout_secs: config.get_int("notify.timeout.secs").unwrap_or(5) as u64,
            },
        })
    }
}

pub type SharedConfig = Arc<Config>;
