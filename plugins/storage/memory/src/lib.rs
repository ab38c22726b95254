use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;

use bench_api::{
    DatabaseStats, KindAggregate, OperationKind, OperationLogEntry, OverflowUsage, Record,
    StoreBackend, StoreError, pretty_size,
};

/// Inline size limit of a row; larger documents count as out-of-line storage.
/// Совпадает с TOAST_TUPLE_THRESHOLD PostgreSQL при 8 kB странице.
pub const OVERFLOW_THRESHOLD_BYTES: usize = 2032;

const RECORDS_UNIT: &str = "records";

// ═══════════════════════════════════════════════════════════════
//  MemoryBackend
// ═══════════════════════════════════════════════════════════════

struct StoredRecord {
    name: Option<String>,
    info: serde_json::Value,
    encoded_len: usize,
}

struct Table {
    rows: BTreeMap<i64, StoredRecord>,
    next_id: i64,
}

/// In-memory storage engine. Используется для тестов и прогонов
/// без PostgreSQL; overflow считается по порогу [`OVERFLOW_THRESHOLD_BYTES`].
pub struct MemoryBackend {
    table: RwLock<Table>,
    log: RwLock<Vec<OperationLogEntry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table { rows: BTreeMap::new(), next_id: 1 }),
            log: RwLock::new(Vec::new()),
        }
    }

    /// Копия лога операций в порядке записи.
    pub async fn log_entries(&self) -> Vec<OperationLogEntry> {
        self.log.read().await.clone()
    }
}

fn encoded_len(info: &serde_json::Value) -> Result<usize, StoreError> {
    Ok(serde_json::to_vec(info)?.len())
}

impl StoreBackend for MemoryBackend {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn insert(
        &self,
        name: Option<String>,
        info: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let encoded_len = encoded_len(&info)?;
            let mut table = self.table.write().await;
            let id = table.next_id;
            table.next_id += 1;
            table.rows.insert(id, StoredRecord { name, info, encoded_len });
            Ok(id)
        })
    }

    fn update(
        &self,
        id: i64,
        name: Option<String>,
        info: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let encoded_len = encoded_len(&info)?;
            let mut table = self.table.write().await;
            match table.rows.get_mut(&id) {
                Some(row) => {
                    *row = StoredRecord { name, info, encoded_len };
                    Ok(1)
                }
                None => Ok(0),
            }
        })
    }

    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut table = self.table.write().await;
            Ok(table.rows.remove(&id).map_or(0, |_| 1))
        })
    }

    fn select_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let table = self.table.read().await;
            Ok(table
                .rows
                .iter()
                .map(|(id, row)| Record { id: *id, name: row.name.clone(), info: row.info.clone() })
                .collect())
        })
    }

    fn append_log(
        &self,
        entry: OperationLogEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.log.write().await.push(entry);
            Ok(())
        })
    }

    fn kind_aggregates(&self) -> Pin<Box<dyn Future<Output = Result<Vec<KindAggregate>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let log = self.log.read().await;
            Ok(reduce_log(&log))
        })
    }

    fn overflow_usage(&self) -> Pin<Box<dyn Future<Output = Result<Vec<OverflowUsage>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let table = self.table.read().await;
            let overflow_bytes: usize = table
                .rows
                .values()
                .filter(|r| r.encoded_len > OVERFLOW_THRESHOLD_BYTES)
                .map(|r| r.encoded_len)
                .sum();
            if overflow_bytes == 0 {
                return Ok(Vec::new());
            }
            let overflow_bytes = overflow_bytes as i64;
            Ok(vec![OverflowUsage {
                unit_name: RECORDS_UNIT.to_string(),
                overflow_bytes,
                human_readable_size: pretty_size(overflow_bytes),
            }])
        })
    }

    fn database_stats(&self) -> Pin<Box<dyn Future<Output = Result<Vec<DatabaseStats>, StoreError>> + Send + '_>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Log reduction
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct Acc {
    samples: u64,
    duration_sum: f64,
    payload_samples: u64,
    payload_sum: f64,
}

/// GROUP BY operation_kind с AVG(duration), AVG(payload) — как в SQL:
/// NULL payload не участвует в среднем, пустая группа не возвращается.
pub fn reduce_log(entries: &[OperationLogEntry]) -> Vec<KindAggregate> {
    let mut groups: BTreeMap<OperationKind, Acc> = BTreeMap::new();
    for entry in entries {
        let acc = groups.entry(entry.operation_kind).or_default();
        acc.samples += 1;
        acc.duration_sum += entry.duration_ns as f64;
        if let Some(bytes) = entry.payload_bytes {
            acc.payload_samples += 1;
            acc.payload_sum += bytes as f64;
        }
    }

    groups
        .into_iter()
        .map(|(kind, acc)| KindAggregate {
            kind,
            samples: acc.samples,
            avg_duration_ns: acc.duration_sum / acc.samples as f64,
            avg_payload_bytes: (acc.payload_samples > 0)
                .then(|| acc.payload_sum / acc.payload_samples as f64),
        })
        .collect()
}
