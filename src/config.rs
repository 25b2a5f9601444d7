use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::search::fitter::DEFAULT_MAX_RECORD_BYTES;

/// Environment variable prefix, e.g. `POLKASYNC__SEARCH__URL`.
pub const ENV_PREFIX: &str = "POLKASYNC";

/// Service configuration, layered from defaults, an optional TOML file and
/// `POLKASYNC__*` environment variables (highest precedence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mongodb: MongoConfig,
    pub search: SearchConfig,
    pub api: UpstreamApiConfig,
    /// Shared secret expected from callers of the sync and preferences APIs.
    pub service_token: String,
    pub networks: Vec<NetworkConfig>,
    pub scheduler: SchedulerConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Meilisearch URL. Search indexing is disabled when empty.
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub index_name: String,
    /// Largest serialized record the index accepts.
    pub max_record_bytes: usize,
    /// How long to wait for the index to apply one document write.
    pub task_timeout_secs: u64,
}

/// The governance REST API that owns treasury statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub timeout_secs: u64,
}

/// A chain the service keeps in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub token_symbol: String,
    pub token_decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub treasury_interval_secs: u64,
    pub index_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Index writes in flight per network during a resync.
    pub concurrency: usize,
}

impl AppConfig {
    /// Load the configuration, reading `file` first when given.
    pub fn load(file: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("mongodb.uri", "mongodb://localhost:27017")?
            .set_default("mongodb.database", "polkassembly")?
            .set_default("search.url", "http://localhost:7700")?
            .set_default("search.index_name", "posts")?
            .set_default("search.max_record_bytes", DEFAULT_MAX_RECORD_BYTES as u64)?
            .set_default("search.task_timeout_secs", 30)?
            .set_default("api.base_url", "https://api.polkassembly.io")?
            .set_default("api.timeout_secs", 30)?
            .set_default("service_token", "dev-token")?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.treasury_interval_secs", 6 * 60 * 60)?
            .set_default("scheduler.index_interval_secs", 15 * 60)?
            .set_default("sync.concurrency", 8)?
            .set_default("networks", default_networks())?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.networks.is_empty() {
            return Err(AppError::Config("at least one network must be configured".into()));
        }
        if self.search.max_record_bytes == 0 {
            return Err(AppError::Config("search.max_record_bytes must be positive".into()));
        }
        if self.sync.concurrency == 0 {
            return Err(AppError::Config("sync.concurrency must be positive".into()));
        }
        Ok(())
    }

    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.name == name)
    }

    pub fn search_enabled(&self) -> bool {
        !self.search.url.is_empty()
    }
}

fn default_networks() -> config::Value {
    let network = |name: &str, symbol: &str, decimals: u8| {
        config::Value::from(config::Map::from([
            ("name".to_string(), config::Value::from(name)),
            ("token_symbol".to_string(), config::Value::from(symbol)),
            ("token_decimals".to_string(), config::Value::from(u64::from(decimals))),
        ]))
    };

    config::Value::from(vec![network("polkadot", "DOT", 10), network("kusama", "KSM", 12)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.search.max_record_bytes, 100_000);
        assert_eq!(config.search.task_timeout_secs, 30);
        assert_eq!(config.networks.len(), 2);
        assert_eq!(config.network("kusama").unwrap().token_decimals, 12);
        assert!(config.network("westend").is_none());
        assert!(config.scheduler.enabled);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!(
            "polkasync-config-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
service_token = "from-file"

[search]
max_record_bytes = 5000

[[networks]]
name = "westend"
token_symbol = "WND"
token_decimals = 12
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.service_token, "from-file");
        assert_eq!(config.search.max_record_bytes, 5000);
        assert_eq!(config.search.index_name, "posts");
        assert_eq!(config.networks.len(), 1);
        assert_eq!(config.networks[0].token_symbol, "WND");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/polkasync.toml")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
