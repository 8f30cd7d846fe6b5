use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub connection_string: Option<String>,
    pub max_connections: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            max_connections: Some(10),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `config` file and
    /// `ANNOTATE_`-prefixed environment variables, in that order.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("ANNOTATE")
                    .separator("__")
                    .prefix_separator("_"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Database URL from config, then `DATABASE_URL`. `None` means the
    /// server runs on the in-memory store.
    pub fn database_url(&self) -> Option<String> {
        self.database
            .connection_string
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn max_connections(&self) -> u32 {
        self.database.max_connections.unwrap_or(10)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_address(), "127.0.0.1:8000");
        assert_eq!(config.max_connections(), 10);
    }

    #[test]
    fn test_configured_connection_string_wins() {
        let mut config = AppConfig::default();
        config.database.connection_string = Some("postgres://localhost/annotate".to_string());
        assert_eq!(
            config.database_url().as_deref(),
            Some("postgres://localhost/annotate")
        );
    }
}
