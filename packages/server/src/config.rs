//! Environment configuration for the discovery server.

use event_discovery::DiscoveryError;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Postgres connection string. Absent means the in-memory store
    /// (development only; nothing survives a restart).
    pub database_url: Option<String>,
    pub openai_api_key: String,
    pub brave_api_key: String,
    pub port: u16,
}

impl ServerConfig {
    /// Read configuration from the environment. The two API keys are the
    /// only hard requirements; without them no discovery is possible.
    pub fn from_env() -> Result<Self, DiscoveryError> {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| DiscoveryError::ConfigurationMissing("OPENAI_API_KEY".into()))?;
        let brave_api_key = std::env::var("BRAVE_API_KEY")
            .map_err(|_| DiscoveryError::ConfigurationMissing("BRAVE_API_KEY".into()))?;

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            openai_api_key,
            brave_api_key,
            port,
        })
    }
}
