use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::StoreError;

// ════════════════════════════════════════════════════════════════
//  Operation kind
// ════════════════════════════════════════════════════════════════

/// Тип CRUD операции — ключ группировки телеметрии.
///
/// Числовые коды фиксированы и совпадают с колонкой `operation_kind`
/// в таблице лога.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[serde(alias = "Select")]
    Select,
    #[serde(alias = "Update")]
    Update,
    #[serde(alias = "Delete")]
    Delete,
    #[serde(alias = "Insert")]
    Insert,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Select,
        OperationKind::Update,
        OperationKind::Delete,
        OperationKind::Insert,
    ];

    pub fn code(self) -> i16 {
        match self {
            OperationKind::Select => 1,
            OperationKind::Update => 2,
            OperationKind::Delete => 3,
            OperationKind::Insert => 4,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(OperationKind::Select),
            2 => Some(OperationKind::Update),
            3 => Some(OperationKind::Delete),
            4 => Some(OperationKind::Insert),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Select => write!(f, "select"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::Insert => write!(f, "insert"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Records
// ════════════════════════════════════════════════════════════════

/// Одна строка таблицы `records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub info: serde_json::Value,
}

/// Тело `POST /addRow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub info: serde_json::Value,
}

/// Тело `PUT /updateRow`. `info` заменяется целиком, без merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub info: serde_json::Value,
}

/// Result of an update against an engine that reports affected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

/// `info` must be a JSON object (key/value tree), not a scalar or array.
pub fn validate_document(info: &serde_json::Value) -> Result<(), StoreError> {
    if info.is_object() {
        Ok(())
    } else {
        Err(StoreError::validation("info must be a JSON object"))
    }
}

// ════════════════════════════════════════════════════════════════
//  Operation log
// ════════════════════════════════════════════════════════════════

/// Append-only запись лога: одна на каждую успешную операцию store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub operation_kind: OperationKind,
    /// Длительность операции в наносекундах.
    pub duration_ns: i64,
    /// Размер сериализованного `info` в байтах; `None` для delete.
    pub payload_bytes: Option<i64>,
}

/// Raw per-kind reduction of the log, as returned by a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindAggregate {
    pub kind: OperationKind,
    pub samples: u64,
    pub avg_duration_ns: f64,
    pub avg_payload_bytes: Option<f64>,
}

// ════════════════════════════════════════════════════════════════
//  Aggregated stats
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindAverages {
    pub samples: u64,
    pub avg_duration_ms: f64,
    pub avg_payload_bytes: Option<f64>,
}

/// Out-of-line (TOAST) storage used by one logical unit of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowUsage {
    pub unit_name: String,
    pub overflow_bytes: i64,
    pub human_readable_size: String,
}

/// Строка `pg_stat_database`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub datname: Option<String>,
    pub numbackends: i32,
    pub xact_commit: i64,
    pub xact_rollback: i64,
    pub blks_read: i64,
    pub blks_hit: i64,
}

/// Ответ `GET /stats`. Вычисляется на каждый запрос, не кешируется.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub per_kind: BTreeMap<OperationKind, KindAverages>,
    pub overflow: Vec<OverflowUsage>,
    pub database: Vec<DatabaseStats>,
}
