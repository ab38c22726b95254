use std::future::Future;
use std::pin::Pin;

use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use bench_api::{
    DatabaseStats, KindAggregate, OperationKind, OperationLogEntry, OverflowUsage, Record,
    StoreBackend, StoreError,
};

const SQL_SCHEMA: &str = include_str!("../sql/schema.sql");

const SQL_INSERT: &str = "INSERT INTO records (name, info) VALUES ($1, $2) RETURNING id";
const SQL_UPDATE: &str = "UPDATE records SET name = $1, info = $2 WHERE id = $3";
const SQL_DELETE: &str = "DELETE FROM records WHERE id = $1";
const SQL_SELECT_ALL: &str = "SELECT id, name, info FROM records";
const SQL_APPEND_LOG: &str =
    "INSERT INTO operation_log (operation_kind, duration_ns, payload_bytes) VALUES ($1, $2, $3)";

const SQL_KIND_AGGREGATES: &str = "
    SELECT operation_kind,
           COUNT(*)                    AS samples,
           AVG(duration_ns)::float8    AS avg_duration_ns,
           AVG(payload_bytes)::float8  AS avg_payload_bytes
    FROM operation_log
    GROUP BY operation_kind";

const SQL_OVERFLOW: &str = "
    SELECT c.relname::text                                 AS unit_name,
           pg_relation_size(c.reltoastrelid)               AS overflow_bytes,
           pg_size_pretty(pg_relation_size(c.reltoastrelid)) AS human_readable_size
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE c.reltoastrelid <> 0
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND pg_relation_size(c.reltoastrelid) > 0";

const SQL_DATABASE_STATS: &str = "
    SELECT datname::text, numbackends, xact_commit, xact_rollback, blks_read, blks_hit
    FROM pg_stat_database";

fn pg_err(e: tokio_postgres::Error) -> StoreError {
    if e.is_closed() {
        StoreError::io(format!("postgres connection closed: {e}"))
    } else {
        StoreError::store(format!("postgres: {e}"))
    }
}

// ═══════════════════════════════════════════════════════════════
//  PostgresBackend
// ═══════════════════════════════════════════════════════════════

/// PostgreSQL storage engine. `info` хранится как JSONB, большие документы
/// уходят в TOAST — его размер и отдаёт [`StoreBackend::overflow_usage`].
///
/// Соединения берутся из пула deadpool, так что конкурентные операции
/// не сериализуются через одно соединение.
pub struct PostgresBackend {
    pool: Pool,
}

impl PostgresBackend {
    pub fn connect(url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(url.to_string());
        cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });
        cfg.pool = Some(PoolConfig::new(pool_size.max(1)));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::io(format!("create pool: {e}")))?;
        Ok(Self { pool })
    }

    async fn client(&self) -> Result<Object, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::io(format!("pool: {e}")))
    }
}

impl StoreBackend for PostgresBackend {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async {
            let client = self.client().await?;
            client.batch_execute(SQL_SCHEMA).await.map_err(pg_err)?;
            tracing::info!("postgres schema ready");
            Ok(())
        })
    }

    fn insert(
        &self,
        name: Option<String>,
        info: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let stmt = client.prepare_cached(SQL_INSERT).await.map_err(pg_err)?;
            let row = client.query_one(&stmt, &[&name, &info]).await.map_err(pg_err)?;
            row.try_get::<_, i64>(0).map_err(pg_err)
        })
    }

    fn update(
        &self,
        id: i64,
        name: Option<String>,
        info: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let stmt = client.prepare_cached(SQL_UPDATE).await.map_err(pg_err)?;
            client.execute(&stmt, &[&name, &info, &id]).await.map_err(pg_err)
        })
    }

    fn delete(&self, id: i64) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let stmt = client.prepare_cached(SQL_DELETE).await.map_err(pg_err)?;
            client.execute(&stmt, &[&id]).await.map_err(pg_err)
        })
    }

    fn select_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let rows = client.query(SQL_SELECT_ALL, &[]).await.map_err(pg_err)?;
            rows.iter()
                .map(|row| {
                    Ok(Record {
                        id: row.try_get("id").map_err(pg_err)?,
                        name: row.try_get("name").map_err(pg_err)?,
                        info: row.try_get("info").map_err(pg_err)?,
                    })
                })
                .collect()
        })
    }

    fn append_log(
        &self,
        entry: OperationLogEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let stmt = client.prepare_cached(SQL_APPEND_LOG).await.map_err(pg_err)?;
            client
                .execute(
                    &stmt,
                    &[&entry.operation_kind.code(), &entry.duration_ns, &entry.payload_bytes],
                )
                .await
                .map_err(pg_err)?;
            Ok(())
        })
    }

    fn kind_aggregates(&self) -> Pin<Box<dyn Future<Output = Result<Vec<KindAggregate>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let rows = client.query(SQL_KIND_AGGREGATES, &[]).await.map_err(pg_err)?;
            rows.iter()
                .map(|row| {
                    let code: i16 = row.try_get("operation_kind").map_err(pg_err)?;
                    let kind = OperationKind::from_code(code)
                        .ok_or_else(|| StoreError::store(format!("unknown operation_kind {code} in log")))?;
                    let samples: i64 = row.try_get("samples").map_err(pg_err)?;
                    Ok(KindAggregate {
                        kind,
                        samples: samples.max(0) as u64,
                        avg_duration_ns: row.try_get("avg_duration_ns").map_err(pg_err)?,
                        avg_payload_bytes: row.try_get("avg_payload_bytes").map_err(pg_err)?,
                    })
                })
                .collect()
        })
    }

    fn overflow_usage(&self) -> Pin<Box<dyn Future<Output = Result<Vec<OverflowUsage>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let rows = client.query(SQL_OVERFLOW, &[]).await.map_err(pg_err)?;
            rows.iter()
                .map(|row| {
                    Ok(OverflowUsage {
                        unit_name: row.try_get("unit_name").map_err(pg_err)?,
                        overflow_bytes: row.try_get("overflow_bytes").map_err(pg_err)?,
                        human_readable_size: row.try_get("human_readable_size").map_err(pg_err)?,
                    })
                })
                .collect()
        })
    }

    fn database_stats(&self) -> Pin<Box<dyn Future<Output = Result<Vec<DatabaseStats>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.client().await?;
            let rows = client.query(SQL_DATABASE_STATS, &[]).await.map_err(pg_err)?;
            rows.iter()
                .map(|row| {
                    Ok(DatabaseStats {
                        datname: row.try_get("datname").map_err(pg_err)?,
                        numbackends: row.try_get("numbackends").map_err(pg_err)?,
                        xact_commit: row.try_get("xact_commit").map_err(pg_err)?,
                        xact_rollback: row.try_get("xact_rollback").map_err(pg_err)?,
                        blks_read: row.try_get("blks_read").map_err(pg_err)?,
                        blks_hit: row.try_get("blks_hit").map_err(pg_err)?,
                    })
                })
                .collect()
        })
    }
}
