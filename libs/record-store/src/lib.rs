pub mod stats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bench_api::{
    NewRecord, OperationKind, OperationLogEntry, Record, StoreBackend, StoreError, UpdateOutcome,
    UpdateRecord, validate_document,
};

pub use stats::{StatsAggregator, spawn_stats_logger};

// ═══════════════════════════════════════════════════════════════
//  RecordStore
// ═══════════════════════════════════════════════════════════════

/// Инструментированный CRUD поверх [`StoreBackend`].
///
/// Каждая успешная операция: замер → выполнение → ровно одна запись
/// в `operation_log`. Неудачная операция в лог-таблицу не пишется, а уходит
/// в диагностический поток (`tracing`) и возвращается вызывающему.
/// Ошибка записи лога никогда не подменяет результат самой операции.
///
/// Последовательность замер/выполнение/лог атомарна только в рамках одной
/// операции: записи лога параллельных операций могут чередоваться.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn StoreBackend>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Вставить запись. Возвращает id, назначенный движком.
    pub async fn insert(&self, record: NewRecord) -> Result<i64, StoreError> {
        validate_document(&record.info)?;
        let payload = payload_len(&record.info)?;

        let start = Instant::now();
        let result = self.backend.insert(record.name, record.info).await;
        let elapsed = start.elapsed();

        match result {
            Ok(id) => {
                self.log(OperationKind::Insert, elapsed, Some(payload)).await;
                Ok(id)
            }
            Err(e) => Err(report_failure(OperationKind::Insert, e)),
        }
    }

    /// Полная замена `name` и `info` по id.
    ///
    /// Бэкенд сообщает число затронутых строк, поэтому отсутствие id
    /// различимо: `UpdateOutcome::NotFound`. Лог пишется для любого
    /// выполненного UPDATE, включая затронувший ноль строк.
    pub async fn update(&self, record: UpdateRecord) -> Result<UpdateOutcome, StoreError> {
        validate_document(&record.info)?;
        let payload = payload_len(&record.info)?;

        let start = Instant::now();
        let result = self.backend.update(record.id, record.name, record.info).await;
        let elapsed = start.elapsed();

        match result {
            Ok(affected) => {
                self.log(OperationKind::Update, elapsed, Some(payload)).await;
                if affected == 0 {
                    tracing::debug!(id = record.id, "update matched no rows");
                    Ok(UpdateOutcome::NotFound)
                } else {
                    Ok(UpdateOutcome::Updated)
                }
            }
            Err(e) => Err(report_failure(OperationKind::Update, e)),
        }
    }

    /// Idempotent delete: a missing id is not an error.
    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.backend.delete(id).await;
        let elapsed = start.elapsed();

        match result {
            Ok(_) => {
                self.log(OperationKind::Delete, elapsed, None).await;
                Ok(())
            }
            Err(e) => Err(report_failure(OperationKind::Delete, e)),
        }
    }

    /// Полный скан. Одна запись Select на весь батч: время скана и
    /// суммарный размер всех возвращённых `info`.
    pub async fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        let start = Instant::now();
        let result = self.backend.select_all().await;
        let elapsed = start.elapsed();

        match result {
            Ok(rows) => {
                let mut total = 0usize;
                for row in &rows {
                    match payload_len(&row.info) {
                        Ok(n) => total += n,
                        Err(e) => tracing::warn!(id = row.id, error = %e, "cannot size row payload"),
                    }
                }
                self.log(OperationKind::Select, elapsed, Some(total)).await;
                Ok(rows)
            }
            Err(e) => Err(report_failure(OperationKind::Select, e)),
        }
    }

    async fn log(&self, kind: OperationKind, elapsed: Duration, payload: Option<usize>) {
        let entry = OperationLogEntry {
            operation_kind: kind,
            duration_ns: i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX),
            payload_bytes: payload.map(|n| i64::try_from(n).unwrap_or(i64::MAX)),
        };
        if let Err(e) = self.backend.append_log(entry).await {
            tracing::error!(kind = %kind, error = ?e, "operation log write failed");
        }
    }
}

fn report_failure(kind: OperationKind, e: StoreError) -> StoreError {
    tracing::warn!(kind = %kind, error_kind = %e.kind(), error = %e, "store operation failed");
    e
}

// ═══════════════════════════════════════════════════════════════
//  Payload size
// ═══════════════════════════════════════════════════════════════

struct ByteCounter(usize);

impl std::io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Размер сериализованного JSON без аллокации буфера под весь документ.
pub fn payload_len(info: &serde_json::Value) -> Result<usize, StoreError> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, info)?;
    Ok(counter.0)
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;

    use bench_api::{DatabaseStats, KindAggregate, OverflowUsage};
    use serde_json::json;
    use storage_memory::MemoryBackend;

    use super::*;

    fn store() -> (RecordStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (RecordStore::new(backend.clone()), backend)
    }

    fn new_record(info: serde_json::Value) -> NewRecord {
        NewRecord { name: Some("row".into()), info }
    }

    async fn kinds_logged(backend: &MemoryBackend) -> Vec<OperationKind> {
        backend.log_entries().await.iter().map(|e| e.operation_kind).collect()
    }

    #[tokio::test]
    async fn every_successful_operation_logs_once() {
        let (store, backend) = store();

        let id = store.insert(new_record(json!({"a": "b"}))).await.unwrap();
        store
            .update(UpdateRecord { id, name: None, info: json!({"a": "c"}) })
            .await
            .unwrap();
        store.get_all().await.unwrap();
        store.delete(id).await.unwrap();

        assert_eq!(
            kinds_logged(&backend).await,
            vec![
                OperationKind::Insert,
                OperationKind::Update,
                OperationKind::Select,
                OperationKind::Delete
            ]
        );
        for entry in backend.log_entries().await {
            assert!(entry.duration_ns >= 0);
        }
    }

    #[tokio::test]
    async fn payload_sizes_match_serialized_documents() {
        let (store, backend) = store();
        let info = json!({"field_0": "abc", "nested": {"x": [1, 2, 3]}});
        let expected = serde_json::to_vec(&info).unwrap().len() as i64;

        store.insert(new_record(info.clone())).await.unwrap();
        store.insert(new_record(info)).await.unwrap();
        store.get_all().await.unwrap();

        let log = backend.log_entries().await;
        assert_eq!(log[0].payload_bytes, Some(expected));
        assert_eq!(log[2].operation_kind, OperationKind::Select);
        assert_eq!(log[2].payload_bytes, Some(expected * 2));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_has_no_payload() {
        let (store, backend) = store();
        let id = store.insert(new_record(json!({}))).await.unwrap();

        store.delete(id).await.unwrap();
        store.delete(id).await.unwrap();
        store.delete(12345).await.unwrap();

        let deletes: Vec<_> = backend
            .log_entries()
            .await
            .into_iter()
            .filter(|e| e.operation_kind == OperationKind::Delete)
            .collect();
        assert_eq!(deletes.len(), 3);
        assert!(deletes.iter().all(|e| e.payload_bytes.is_none()));
    }

    #[tokio::test]
    async fn update_of_missing_id_is_reported() {
        let (store, _) = store();
        let outcome = store
            .update(UpdateRecord { id: 77, name: None, info: json!({"k": 1}) })
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn non_object_document_is_rejected_without_logging() {
        let (store, backend) = store();
        let err = store.insert(new_record(json!("scalar"))).await.unwrap_err();
        assert!(err.is_validation());
        assert!(backend.log_entries().await.is_empty());
    }

    /// Memory backend with selectable broken methods; the rest delegates.
    #[derive(Default)]
    pub(crate) struct FaultyBackend {
        pub(crate) inner: MemoryBackend,
        pub(crate) fail_insert: bool,
        pub(crate) fail_log: bool,
        pub(crate) fail_overflow: bool,
    }

    fn broken<T: Send + 'static>(what: &'static str) -> Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'static>> {
        Box::pin(async move { Err(StoreError::store(format!("{what} unavailable"))) })
    }

    impl StoreBackend for FaultyBackend {
        fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            self.inner.init()
        }
        fn insert(
            &self,
            name: Option<String>,
            info: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>> {
            if self.fail_insert {
                return broken("records table");
            }
            self.inner.insert(name, info)
        }
        fn update(
            &self,
            id: i64,
            name: Option<String>,
            info: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
            self.inner.update(id, name, info)
        }
        fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
            self.inner.delete(id)
        }
        fn select_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, StoreError>> + Send + '_>> {
            self.inner.select_all()
        }
        fn append_log(
            &self,
            entry: OperationLogEntry,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            if self.fail_log {
                return broken("log table");
            }
            self.inner.append_log(entry)
        }
        fn kind_aggregates(&self) -> Pin<Box<dyn Future<Output = Result<Vec<KindAggregate>, StoreError>> + Send + '_>> {
            self.inner.kind_aggregates()
        }
        fn overflow_usage(&self) -> Pin<Box<dyn Future<Output = Result<Vec<OverflowUsage>, StoreError>> + Send + '_>> {
            if self.fail_overflow {
                return broken("pg_class");
            }
            self.inner.overflow_usage()
        }
        fn database_stats(&self) -> Pin<Box<dyn Future<Output = Result<Vec<DatabaseStats>, StoreError>> + Send + '_>> {
            self.inner.database_stats()
        }
    }

    #[tokio::test]
    async fn log_failure_does_not_mask_primary_result() {
        let store = RecordStore::new(Arc::new(FaultyBackend { fail_log: true, ..Default::default() }));

        let id = store.insert(new_record(json!({"k": "v"}))).await.unwrap();
        let rows = store.get_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        store.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn failed_operation_surfaces_error_and_is_not_logged() {
        let backend = Arc::new(FaultyBackend { fail_insert: true, ..Default::default() });
        let store = RecordStore::new(backend.clone());

        let err = store.insert(new_record(json!({"k": "v"}))).await.unwrap_err();
        assert_eq!(err.kind(), bench_api::ErrorKind::Store);
        assert!(backend.inner.log_entries().await.is_empty());

        // other operations on the same store still log
        store.get_all().await.unwrap();
        assert_eq!(kinds_logged(&backend.inner).await, vec![OperationKind::Select]);
    }
}
