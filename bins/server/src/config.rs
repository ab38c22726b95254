use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "jsonb-server", about = "CRUD-шлюз к JSONB хранилищу с телеметрией")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,

    /// Строка подключения к PostgreSQL (перекрывает `database_url` из файла)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Порт HTTP API (перекрывает `api_port` из файла)
    #[arg(long)]
    pub api_port: Option<u16>,
}

// ---- TOML Config ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    pub database_url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Период логирования статистики, 0 — выключено.
    #[serde(default = "default_stats_log_interval")]
    pub stats_log_interval_secs: u64,
}

fn default_api_port() -> u16 {
    8080
}
fn default_backend() -> BackendKind {
    BackendKind::Postgres
}
fn default_pool_size() -> usize {
    16
}
fn default_stats_log_interval() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            backend: default_backend(),
            database_url: None,
            pool_size: default_pool_size(),
            stats_log_interval_secs: default_stats_log_interval(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Файл конфигурации необязателен: если его нет, берутся значения по
    /// умолчанию; CLI/env перекрывают файл.
    pub fn resolve(args: &ServeArgs) -> Result<Self, ServerError> {
        let mut config = if std::path::Path::new(&args.config).exists() {
            Self::load(&args.config)?
        } else {
            Self::default()
        };

        if let Some(url) = &args.database_url {
            config.database_url = Some(url.clone());
        }
        if let Some(port) = args.api_port {
            config.api_port = port;
        }
        if config.pool_size == 0 {
            return Err(ServerError::Config { context: "validate", detail: "pool_size must be > 0".into() });
        }
        Ok(config)
    }
}
