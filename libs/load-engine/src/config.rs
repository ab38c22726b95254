use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use bench_api::OperationKind;

use crate::LoadError;

/// Нижняя граница интервала тика (≈100k запросов/с на поток).
pub const MIN_TICK_INTERVAL: Duration = Duration::from_micros(10);

/// Верхняя граница: поток с более редким тиком считается выключенным.
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(3600);

// ═══════════════════════════════════════════════════════════════
//  LoadConfig
// ═══════════════════════════════════════════════════════════════

/// Форма синтетического документа `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub field_count: usize,
    pub field_string_length: usize,
}

/// Конфигурация нагрузки. Заменяется целиком (без merge) через
/// `POST /updateConfig`.
///
/// Rate ≤ 0 or a kind missing from `rates` disables that stream until a
/// later config gives it a positive rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    pub base_url: String,
    pub rates: BTreeMap<OperationKind, f64>,
    pub shape: Shape,
    /// Потолок одновременных запросов на поток. `None` — без ограничения.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

impl LoadConfig {
    /// Positive rate for `kind`, `None` when the stream is disabled.
    pub fn rate(&self, kind: OperationKind) -> Option<f64> {
        self.rates
            .get(&kind)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Интервал между тиками `1 / rate`. `None` — поток выключен
    /// (включая rate ниже одного запроса в [`MAX_TICK_INTERVAL`]).
    pub fn interval(&self, kind: OperationKind) -> Option<Duration> {
        let rate = self.rate(kind)?;
        Duration::try_from_secs_f64(1.0 / rate)
            .ok()
            .filter(|d| *d <= MAX_TICK_INTERVAL)
            .map(|d| d.max(MIN_TICK_INTERVAL))
    }
}

// ═══════════════════════════════════════════════════════════════
//  ConfigController
// ═══════════════════════════════════════════════════════════════

/// Единственный владелец актуального `LoadConfig`.
///
/// Потоки получают неизменяемый снимок (`Arc<LoadConfig>`) на каждом тике
/// и не держат ссылок на живую конфигурацию. Замена — атомарный swap
/// указателя под write-lock; перезапуска тикеров нет.
pub struct ConfigController {
    current: RwLock<Arc<LoadConfig>>,
}

impl ConfigController {
    pub fn new(initial: LoadConfig) -> Self {
        Self { current: RwLock::new(Arc::new(initial)) }
    }

    pub async fn get(&self) -> Arc<LoadConfig> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, config: LoadConfig) -> Arc<LoadConfig> {
        let config = Arc::new(config);
        *self.current.write().await = config.clone();
        config
    }

    /// Decode a full config from JSON and swap it in. A body that does not
    /// decode leaves the current config untouched.
    pub async fn replace_json(&self, body: &[u8]) -> Result<Arc<LoadConfig>, LoadError> {
        let config: LoadConfig = serde_json::from_slice(body)?;
        Ok(self.replace(config).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LoadConfig {
        LoadConfig {
            base_url: "http://app:8080".into(),
            rates: BTreeMap::from([(OperationKind::Insert, 10.0), (OperationKind::Select, 0.5)]),
            shape: Shape { field_count: 4, field_string_length: 16 },
            max_in_flight: None,
        }
    }

    #[test]
    fn non_positive_rates_disable_the_stream() {
        let mut cfg = sample();
        cfg.rates.insert(OperationKind::Delete, 0.0);
        cfg.rates.insert(OperationKind::Update, -3.0);

        assert_eq!(cfg.interval(OperationKind::Insert), Some(Duration::from_millis(100)));
        assert_eq!(cfg.interval(OperationKind::Select), Some(Duration::from_secs(2)));
        assert_eq!(cfg.interval(OperationKind::Delete), None);
        assert_eq!(cfg.interval(OperationKind::Update), None);

        cfg.rates.remove(&OperationKind::Update);
        assert_eq!(cfg.rate(OperationKind::Update), None);
    }

    #[test]
    fn huge_rates_are_clamped() {
        let mut cfg = sample();
        cfg.rates.insert(OperationKind::Insert, 1e12);
        assert_eq!(cfg.interval(OperationKind::Insert), Some(MIN_TICK_INTERVAL));

        cfg.rates.insert(OperationKind::Insert, 1e-300);
        assert_eq!(cfg.interval(OperationKind::Insert), None);
    }

    #[test]
    fn tiny_rates_disable_the_stream() {
        let mut cfg = sample();
        cfg.rates.insert(OperationKind::Insert, 1e-19);
        assert_eq!(cfg.interval(OperationKind::Insert), None);

        cfg.rates.insert(OperationKind::Insert, 0.001);
        assert!(cfg.interval(OperationKind::Insert).is_some());

        cfg.rates.insert(OperationKind::Insert, 1.0 / 3601.0);
        assert_eq!(cfg.interval(OperationKind::Insert), None);
    }

    #[tokio::test]
    async fn snapshot_is_not_affected_by_later_replace() {
        let controller = ConfigController::new(sample());
        let before = controller.get().await;

        let mut next = sample();
        next.base_url = "http://other:9000".into();
        controller.replace(next).await;

        assert_eq!(before.base_url, "http://app:8080");
        assert_eq!(controller.get().await.base_url, "http://other:9000");
    }

    #[tokio::test]
    async fn replace_json_is_wholesale() {
        let controller = ConfigController::new(sample());
        let body = br#"{
            "base_url": "http://app:8080",
            "rates": {"Update": 2},
            "shape": {"field_count": 1, "field_string_length": 8}
        }"#;

        let cfg = controller.replace_json(body).await.unwrap();

        assert_eq!(cfg.rate(OperationKind::Update), Some(2.0));
        // no merge with the previous rates
        assert_eq!(cfg.rate(OperationKind::Insert), None);
    }

    #[tokio::test]
    async fn malformed_json_keeps_current_config() {
        let controller = ConfigController::new(sample());

        assert!(controller.replace_json(b"{\"base_url\": 1").await.is_err());
        assert!(controller.replace_json(br#"{"base_url": "x", "rates": {}}"#).await.is_err());
        assert!(
            controller
                .replace_json(br#"{"base_url": "x", "rates": {"bogus": 1}, "shape": {"field_count": 1, "field_string_length": 1}}"#)
                .await
                .is_err()
        );

        assert_eq!(*controller.get().await, sample());
    }
}
