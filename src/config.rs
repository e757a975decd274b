//! Runtime configuration.
//!
//! Values come from the environment; CLI flags override them. API keys for
//! the completion and search providers are read by their own clients
//! (`OPENAI_API_KEY`, `TAVILY_API_KEY`) and never stored here.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::completion::{CompletionClient, DEFAULT_MODEL};
use crate::database::{Database, PostgresSettings, SqliteDatabase};
use crate::gateway::openai::OpenAiAdapter;
use crate::gateway::{
    ChatGateway, ChatModel, GatewayConfig, ProviderError, ProviderGateway, TracingUsageSink,
};
use crate::pipeline::QueryAgent;
use crate::search::{SearchError, TavilyClient};

pub const DEFAULT_SQLITE_PATH: &str = "insights.sqlite";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Where questions are answered from.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Sqlite { path: PathBuf, read_only: bool },
    Postgres(PostgresSettings),
}

impl DatabaseConfig {
    pub fn connect(&self) -> Result<Arc<dyn Database>, ConfigError> {
        match self {
            DatabaseConfig::Sqlite { path, read_only } => {
                Ok(Arc::new(SqliteDatabase::new(path).read_only(*read_only)))
            }
            #[cfg(feature = "postgres")]
            DatabaseConfig::Postgres(settings) => Ok(Arc::new(
                crate::database::PostgresDatabase::new(settings.clone()),
            )),
            #[cfg(not(feature = "postgres"))]
            DatabaseConfig::Postgres(_) => Err(ConfigError::Unsupported(
                "postgres backend requires building with --features postgres".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    pub database: DatabaseConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: 0.0,
            max_tokens: None,
            max_retries: GatewayConfig::default().max_retries,
            database: DatabaseConfig::Sqlite {
                path: PathBuf::from(DEFAULT_SQLITE_PATH),
                read_only: false,
            },
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let model = lookup("INSIGHTS_MODEL").unwrap_or(defaults.model);
        let temperature = parse_or("INSIGHTS_TEMPERATURE", &lookup, defaults.temperature)?;
        let max_tokens = match lookup("INSIGHTS_MAX_TOKENS") {
            Some(v) => Some(parse_value("INSIGHTS_MAX_TOKENS", v)?),
            None => None,
        };
        let max_retries = parse_or("INSIGHTS_MAX_RETRIES", &lookup, defaults.max_retries)?;

        let backend = lookup("INSIGHTS_DB_BACKEND").unwrap_or_else(|| "sqlite".into());
        let database = match backend.to_lowercase().as_str() {
            "sqlite" => DatabaseConfig::Sqlite {
                path: lookup("INSIGHTS_DB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH)),
                read_only: parse_or("INSIGHTS_DB_READ_ONLY", &lookup, false)?,
            },
            "postgres" | "postgresql" => {
                let pg = PostgresSettings::default();
                DatabaseConfig::Postgres(PostgresSettings {
                    host: lookup("PGHOST").unwrap_or(pg.host),
                    port: parse_or("PGPORT", &lookup, pg.port)?,
                    user: lookup("PGUSER").unwrap_or(pg.user),
                    password: lookup("PGPASSWORD").unwrap_or(pg.password),
                    database: lookup("PGDATABASE").unwrap_or(pg.database),
                })
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "INSIGHTS_DB_BACKEND",
                    value: backend,
                })
            }
        };

        Ok(Self {
            model,
            temperature,
            max_tokens,
            max_retries,
            database,
        })
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_retries: self.max_retries,
            ..GatewayConfig::default()
        }
    }

    pub fn completion_client(&self, gateway: Arc<dyn ChatGateway>) -> CompletionClient {
        CompletionClient::new(gateway, ChatModel::openai(&self.model))
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
    }

    /// Wire the production collaborators: OpenAI-compatible gateway, the
    /// configured database, and Tavily search.
    pub fn build_agent(&self) -> Result<QueryAgent, ConfigError> {
        let adapter = OpenAiAdapter::from_env()?;
        let gateway: Arc<dyn ChatGateway> = Arc::new(ProviderGateway::with_config(
            adapter,
            Arc::new(TracingUsageSink),
            self.gateway_config(),
        ));
        let database = self.database.connect()?;
        let search = Arc::new(TavilyClient::from_env()?);

        Ok(QueryAgent::new(
            self.completion_client(gateway),
            database,
            search,
        ))
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => parse_value(key, v),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.model, "gpt-4-turbo-preview");
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn reads_sqlite_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("INSIGHTS_MODEL", "gpt-4o-mini"),
            ("INSIGHTS_DB_PATH", "/tmp/shop.sqlite"),
            ("INSIGHTS_DB_READ_ONLY", "true"),
            ("INSIGHTS_MAX_TOKENS", "512"),
        ]))
        .unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, Some(512));
        assert_eq!(
            config.database,
            DatabaseConfig::Sqlite {
                path: PathBuf::from("/tmp/shop.sqlite"),
                read_only: true,
            }
        );
    }

    #[test]
    fn reads_postgres_parameters() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("INSIGHTS_DB_BACKEND", "postgres"),
            ("PGHOST", "db.internal"),
            ("PGPORT", "6543"),
        ]))
        .unwrap();
        match config.database {
            DatabaseConfig::Postgres(pg) => {
                assert_eq!(pg.host, "db.internal");
                assert_eq!(pg.port, 6543);
                assert_eq!(pg.user, "admin");
                assert_eq!(pg.database, "mydb");
            }
            other => panic!("expected postgres config, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_values() {
        let err = AgentConfig::from_lookup(lookup(&[("INSIGHTS_TEMPERATURE", "warm")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "INSIGHTS_TEMPERATURE",
                ..
            }
        ));

        let err =
            AgentConfig::from_lookup(lookup(&[("INSIGHTS_DB_BACKEND", "oracle")])).unwrap_err();
        assert!(err.to_string().contains("INSIGHTS_DB_BACKEND"));
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn postgres_without_feature_is_unsupported() {
        let config = DatabaseConfig::Postgres(PostgresSettings::default());
        assert!(matches!(
            config.connect(),
            Err(ConfigError::Unsupported(_))
        ));
    }
}
