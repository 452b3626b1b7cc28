#![cfg(feature = "db")]

//! PostgreSQL-backed module store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::domain::{ModulePatch, PvModule};

use super::{ModuleStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pv_modules (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    celltype TEXT NOT NULL,
    voc DOUBLE PRECISION NOT NULL,
    isc DOUBLE PRECISION NOT NULL,
    vmp DOUBLE PRECISION NOT NULL,
    imp DOUBLE PRECISION NOT NULL,
    ns INTEGER NOT NULL,
    kv DOUBLE PRECISION NOT NULL,
    ki DOUBLE PRECISION NOT NULL,
    gamma_pmp DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const COLUMNS: &str = "id, name, celltype, voc, isc, vmp, imp, ns, kv, ki, gamma_pmp, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ModuleRow {
    id: Uuid,
    name: String,
    celltype: String,
    voc: f64,
    isc: f64,
    vmp: f64,
    imp: f64,
    ns: i32,
    kv: f64,
    ki: f64,
    gamma_pmp: f64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ModuleRow> for PvModule {
    type Error = StoreError;

    fn try_from(row: ModuleRow) -> Result<Self, StoreError> {
        let celltype = row.celltype.parse().map_err(StoreError::Backend)?;
        Ok(PvModule {
            id: row.id,
            name: row.name,
            celltype,
            voc: row.voc,
            isc: row.isc,
            vmp: row.vmp,
            imp: row.imp,
            ns: row.ns,
            kv: row.kv,
            ki: row.ki,
            gamma_pmp: row.gamma_pmp,
            created_at: row.created_at,
        })
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure the module table exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(backend)?;
        sqlx::query(SCHEMA).execute(&pool).await.map_err(backend)?;
        Ok(Self { pool })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl ModuleStore for PgStore {
    async fn insert(&self, module: PvModule) -> Result<PvModule, StoreError> {
        let query = format!("INSERT INTO pv_modules ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)");
        sqlx::query(&query)
            .bind(module.id)
            .bind(&module.name)
            .bind(module.celltype.as_str())
            .bind(module.voc)
            .bind(module.isc)
            .bind(module.vmp)
            .bind(module.imp)
            .bind(module.ns)
            .bind(module.kv)
            .bind(module.ki)
            .bind(module.gamma_pmp)
            .bind(module.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateName(module.name.clone())
                } else {
                    backend(e)
                }
            })?;
        Ok(module)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PvModule>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM pv_modules WHERE id = $1");
        let row: Option<ModuleRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(PvModule::try_from).transpose()
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<PvModule>, StoreError> {
        let query =
            format!("SELECT {COLUMNS} FROM pv_modules ORDER BY created_at, name OFFSET $1 LIMIT $2");
        let rows: Vec<ModuleRow> = sqlx::query_as(&query)
            .bind(offset.max(0))
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(PvModule::try_from).collect()
    }

    async fn update(&self, id: Uuid, patch: ModulePatch) -> Result<Option<PvModule>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let query = format!("SELECT {COLUMNS} FROM pv_modules WHERE id = $1 FOR UPDATE");
        let row: Option<ModuleRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut module = PvModule::try_from(row)?;
        patch.apply_to(&mut module);
        sqlx::query(
            "UPDATE pv_modules SET name = $2, celltype = $3, voc = $4, isc = $5, vmp = $6, \
             imp = $7, ns = $8, kv = $9, ki = $10, gamma_pmp = $11 WHERE id = $1",
        )
        .bind(module.id)
        .bind(&module.name)
        .bind(module.celltype.as_str())
        .bind(module.voc)
        .bind(module.isc)
        .bind(module.vmp)
        .bind(module.imp)
        .bind(module.ns)
        .bind(module.kv)
        .bind(module.ki)
        .bind(module.gamma_pmp)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateName(module.name.clone())
            } else {
                backend(e)
            }
        })?;
        tx.commit().await.map_err(backend)?;
        Ok(Some(module))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pv_modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }
}
