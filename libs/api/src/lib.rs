//! Shared types and the storage-engine seam for the JSONB load bench.
//!
//! Every backend (in-memory, PostgreSQL) implements [`StoreBackend`]; the
//! record store, stats aggregator, HTTP API and load generator only ever
//! talk in the types defined here.

mod error;
mod types;
mod util;

use std::future::Future;
use std::pin::Pin;

pub use error::{ErrorKind, StoreError};
pub use types::*;
pub use util::{now_ms, pretty_size};

// ════════════════════════════════════════════════════════════════
//  Storage engine seam
// ════════════════════════════════════════════════════════════════

/// Query interface к движку хранения.
///
/// Реализации обязаны быть безопасны для конкурентного использования:
/// параллельные CRUD вызовы не должны сериализоваться через одно соединение.
/// Бэкенд ничего не знает о телеметрии — измерение длительности и запись
/// лога делает `RecordStore`.
pub trait StoreBackend: Send + Sync {
    /// Создание таблиц, если их нет. Идемпотентно.
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Вставить запись, вернуть id, назначенный движком.
    fn insert(
        &self,
        name: Option<String>,
        info: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>>;

    /// Заменить `name` и `info` записи. Возвращает число затронутых строк.
    fn update(
        &self,
        id: i64,
        name: Option<String>,
        info: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;

    /// Удалить запись. Возвращает число удалённых строк (0 — не ошибка).
    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;

    /// Полный скан таблицы записей, порядок не гарантируется.
    fn select_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, StoreError>> + Send + '_>>;

    /// Append one entry to the operation log.
    fn append_log(
        &self,
        entry: OperationLogEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Reduce the operation log grouped by kind. Kinds without entries are absent.
    fn kind_aggregates(&self) -> Pin<Box<dyn Future<Output = Result<Vec<KindAggregate>, StoreError>> + Send + '_>>;

    /// Out-of-line storage per logical unit. Units without it are omitted.
    fn overflow_usage(&self) -> Pin<Box<dyn Future<Output = Result<Vec<OverflowUsage>, StoreError>> + Send + '_>>;

    /// Engine-wide database counters; empty when the engine has none.
    fn database_stats(&self) -> Pin<Box<dyn Future<Output = Result<Vec<DatabaseStats>, StoreError>> + Send + '_>>;
}
