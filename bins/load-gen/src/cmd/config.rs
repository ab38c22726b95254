use std::collections::BTreeMap;
use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use bench_api::OperationKind;
use load_engine::{DEFAULT_REQUEST_TIMEOUT, LoadConfig, Shape};

use super::error::WorkloadError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub base_url: Option<String>,
    pub control_port: Option<u16>,
    pub timeout_ms: Option<u64>,
    pub seed: Option<u64>,
    pub duration_secs: Option<u64>,
    pub drain_secs: Option<u64>,
    pub max_in_flight: Option<usize>,
    /// `{ Insert = 100, Select = 1, ... }`; ключи — имена `OperationKind`.
    pub rates: Option<toml::Value>,
    pub shape: Option<Shape>,
}

pub fn load_config(path: &str) -> Result<Config, WorkloadError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WorkloadError::Config(format!("cannot read config {path}: {e}")))?;
    parse_config(&content).map_err(|e| WorkloadError::Config(format!("bad config {path}: {e}")))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Rates go through JSON so the table keys decode with the same
/// `OperationKind` rules as `POST /updateConfig`.
fn decode_rates(value: &toml::Value) -> Result<BTreeMap<OperationKind, f64>, WorkloadError> {
    let json = serde_json::to_value(value).map_err(|e| WorkloadError::Config(format!("rates: {e}")))?;
    serde_json::from_value(json).map_err(|e| WorkloadError::Config(format!("rates: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct GenArgs {
    /// Путь к workload.toml
    #[arg(long, default_value = "workload.toml", env = "LOAD_GEN_CONFIG")]
    pub config: String,

    /// Базовый URL CRUD API, напр. http://app:8080
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Порт control API (POST /updateConfig)
    #[arg(long, env = "CONTROL_PORT")]
    pub control_port: Option<u16>,

    /// Таймаут HTTP запроса в мс
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Seed для PRNG (0 = текущее время)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Длительность прогона в секундах (0 = до Ctrl+C)
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: workload.toml < env/CLI
pub struct Effective {
    pub load: LoadConfig,
    pub control_port: u16,
    pub timeout: Duration,
    pub seed: u64,
    pub duration: Option<Duration>,
    pub drain: Duration,
}

impl Effective {
    pub fn new(args: &GenArgs) -> Result<Self, WorkloadError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &GenArgs, cfg: Config) -> Result<Self, WorkloadError> {
        let base_url = args
            .base_url
            .clone()
            .or(cfg.base_url)
            .ok_or_else(|| WorkloadError::Config("base_url is required (--base-url or config)".into()))?;

        let rates = match &cfg.rates {
            Some(v) => decode_rates(v)?,
            None => BTreeMap::new(),
        };
        if rates.is_empty() {
            tracing::warn!("no rates configured, all streams idle until POST /updateConfig");
        }

        let duration_secs = args.duration_secs.or(cfg.duration_secs).unwrap_or(0);
        let timeout = args
            .timeout_ms
            .or(cfg.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            load: LoadConfig {
                base_url,
                rates,
                shape: cfg.shape.unwrap_or(Shape { field_count: 10, field_string_length: 32 }),
                max_in_flight: cfg.max_in_flight,
            },
            control_port: args.control_port.or(cfg.control_port).unwrap_or(9300),
            timeout,
            seed: args.seed.or(cfg.seed).unwrap_or(0),
            duration: (duration_secs > 0).then(|| Duration::from_secs(duration_secs)),
            drain: Duration::from_secs(cfg.drain_secs.unwrap_or(5)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GenArgs {
        GenArgs {
            config: "workload.toml".into(),
            base_url: None,
            control_port: None,
            timeout_ms: None,
            seed: None,
            duration_secs: None,
        }
    }

    #[test]
    fn file_values_are_used() {
        let cfg = parse_config(
            r#"
            base_url = "http://app:8080"
            control_port = 9400
            duration_secs = 60
            max_in_flight = 512

            [rates]
            Insert = 100
            select = 0.5

            [shape]
            field_count = 3
            field_string_length = 8
            "#,
        )
        .unwrap();

        let eff = Effective::merge(&args(), cfg).unwrap();
        assert_eq!(eff.control_port, 9400);
        assert_eq!(eff.duration, Some(Duration::from_secs(60)));
        assert_eq!(eff.timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(eff.load.rate(OperationKind::Insert), Some(100.0));
        assert_eq!(eff.load.rate(OperationKind::Select), Some(0.5));
        assert_eq!(eff.load.shape, Shape { field_count: 3, field_string_length: 8 });
        assert_eq!(eff.load.max_in_flight, Some(512));
    }

    #[test]
    fn cli_overrides_file() {
        let cfg = parse_config("base_url = \"http://file\"\nseed = 1").unwrap();
        let mut a = args();
        a.base_url = Some("http://cli".into());
        a.seed = Some(2);
        a.duration_secs = Some(0);

        let eff = Effective::merge(&a, cfg).unwrap();
        assert_eq!(eff.load.base_url, "http://cli");
        assert_eq!(eff.seed, 2);
        assert_eq!(eff.duration, None);
    }

    #[test]
    fn base_url_is_required() {
        assert!(Effective::merge(&args(), Config::default()).is_err());
    }

    #[test]
    fn unknown_rate_kind_is_rejected() {
        let cfg = parse_config("base_url = \"x\"\n[rates]\nUpsert = 1").unwrap();
        assert!(Effective::merge(&args(), cfg).is_err());
    }
}
