use serde::Deserialize;

/// Application configuration, loaded from environment variables with a
/// `__` section separator (e.g. `OIDC__ISSUER`, `SERVER__PORT`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub oidc: OidcConfig,
    pub session: SessionConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Identity-provider credentials. All three are required.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    /// Issuer URL, e.g. `https://keycloak.example.com/realms/portal`.
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for signing session tokens. Required.
    pub secret: String,
    /// Session lifetime in seconds (default: 30 days).
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path, with or without a `sqlite:` prefix.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated allowed origins, or `*`.
    pub origins: String,
}

impl Config {
    /// Load configuration from the environment, applying defaults for
    /// everything except provider credentials and the session secret.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("session.ttl_seconds", 60 * 60 * 24 * 30)?
            .set_default("database.url", "sqlite:./data/portal.db")?
            .set_default("logging.level", "info")?
            .set_default("cors.origins", "*")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(#[from] config::ConfigError),
}
