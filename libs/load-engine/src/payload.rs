use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::{Map, Value};

use bench_api::{NewRecord, OperationKind, UpdateRecord};

use crate::config::{LoadConfig, Shape};

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub struct Rng {
    state: u64,
}

impl Rng {
    /// `seed == 0` — засев от текущего времени.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1 // ensure non-zero
        } else {
            seed
        };
        Self { state }
    }

    /// Независимый генератор для отдельного потока.
    pub fn fork(&mut self) -> Self {
        Self { state: self.next_u64() | 1 }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    pub fn next_intn(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    pub fn alphanumeric(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| ALPHANUMERIC[self.next_intn(ALPHANUMERIC.len())] as char)
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Synthetic documents
// ═══════════════════════════════════════════════════════════════

/// Object with `shape.field_count` keys `field_0..`, each holding a random
/// alphanumeric string of `shape.field_string_length` characters.
pub fn synth_document(shape: &Shape, rng: &mut Rng) -> Value {
    let mut doc = Map::with_capacity(shape.field_count);
    for i in 0..shape.field_count {
        doc.insert(format!("field_{i}"), Value::String(rng.alphanumeric(shape.field_string_length)));
    }
    Value::Object(doc)
}

// ═══════════════════════════════════════════════════════════════
//  IdTracker
// ═══════════════════════════════════════════════════════════════

/// Наибольший id, возвращённый успешным `/addRow`.
///
/// Update/Delete targets are drawn from `1..=high_water`; before the first
/// insert completes the range is `1..=1`.
#[derive(Debug, Default)]
pub struct IdTracker {
    high_water: AtomicI64,
}

impl IdTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, id: i64) {
        self.high_water.fetch_max(id, Ordering::Relaxed);
    }

    pub fn high_water(&self) -> i64 {
        self.high_water.load(Ordering::Relaxed).max(1)
    }

    pub fn pick(&self, rng: &mut Rng) -> i64 {
        let hw = self.high_water() as usize;
        rng.next_intn(hw) as i64 + 1
    }
}

// ═══════════════════════════════════════════════════════════════
//  OpRequest
// ═══════════════════════════════════════════════════════════════

/// Один запрос к CRUD API, уже полностью синтезированный.
#[derive(Debug, Clone, PartialEq)]
pub enum OpRequest {
    Insert(NewRecord),
    Update(UpdateRecord),
    Delete { id: i64 },
    Select,
}

impl OpRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Insert(_) => OperationKind::Insert,
            Self::Update(_) => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
            Self::Select => OperationKind::Select,
        }
    }

    /// Build the request for `kind` from the snapshot taken at firing time.
    pub fn build(kind: OperationKind, config: &LoadConfig, rng: &mut Rng, ids: &IdTracker) -> Self {
        match kind {
            OperationKind::Insert => Self::Insert(NewRecord {
                name: Some(format!("User_{}", rng.alphanumeric(8))),
                info: synth_document(&config.shape, rng),
            }),
            OperationKind::Update => Self::Update(UpdateRecord {
                id: ids.pick(rng),
                name: Some(format!("User_{}", rng.alphanumeric(8))),
                info: synth_document(&config.shape, rng),
            }),
            OperationKind::Delete => Self::Delete { id: ids.pick(rng) },
            OperationKind::Select => Self::Select,
        }
    }
}
