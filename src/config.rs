use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Secret<String>,
    pub database_max_connections: u32,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Sessions
    pub secure_cookies: bool,
    pub session_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("database_max_connections", 20)?
            .set_default("secure_cookies", true)?
            .set_default("session_ttl_hours", 24)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: Secret::new(config.get("database_url")?),
            database_max_connections: config.get("database_max_connections")?,
            base_url: config.get("base_url")?,
            host: config.get("host")?,
            port: config.get("port")?,

            secure_cookies: config.get("secure_cookies")?,
            session_ttl_hours: config.get("session_ttl_hours")?,
        })
    }
}
