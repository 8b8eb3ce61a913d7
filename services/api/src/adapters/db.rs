//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. Every collection lives in
//! one PostgreSQL table with a JSONB payload column, accessed through `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use simricare_core::domain::{new_document_id, FieldFilter, StoredDocument};
use simricare_core::ports::{DocumentStore, PortError, PortResult};
use sqlx::types::Json;
use sqlx::migrate::Migrator;
use sqlx::{FromRow, PgPool};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    collection: String,
    id: String,
    data: Json<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> StoredDocument {
        StoredDocument {
            id: self.id,
            collection: self.collection,
            data: self.data.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const COLUMNS: &str = "collection, id, data, created_at, updated_at";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Unique violations (e.g. a second open assignment of the same test) are conflicts.
fn write_failed(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        e => unexpected(e),
    }
}

fn not_found<'a>(collection: &'a str, id: &'a str) -> impl FnOnce(sqlx::Error) -> PortError + 'a {
    move |e| match e {
        sqlx::Error::RowNotFound => {
            PortError::NotFound(format!("Document {}/{} not found", collection, id))
        }
        e => write_failed(e),
    }
}

/// Folds equality filters into a single JSONB containment object.
fn containment(filters: &[FieldFilter]) -> Value {
    let mut object = Map::new();
    for filter in filters {
        object.insert(filter.field.clone(), filter.value.clone());
    }
    Value::Object(object)
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> PortResult<StoredDocument> {
        if !data.is_object() {
            return Err(PortError::Invalid("document data must be an object".to_string()));
        }
        let id = id.map(str::to_string).unwrap_or_else(new_document_id);
        let sql = format!(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = now() \
             RETURNING {COLUMNS}"
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(collection)
            .bind(&id)
            .bind(Json(data))
            .fetch_one(&self.pool)
            .await
            .map_err(write_failed)?;
        Ok(record.to_domain())
    }

    async fn get(&self, collection: &str, id: &str) -> PortResult<StoredDocument> {
        let sql = format!("SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2");
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(collection)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(collection, id))?;
        Ok(record.to_domain())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> PortResult<StoredDocument> {
        if !patch.is_object() {
            return Err(PortError::Invalid("update patch must be an object".to_string()));
        }
        let sql = format!(
            "UPDATE documents SET data = data || $3, updated_at = now() \
             WHERE collection = $1 AND id = $2 RETURNING {COLUMNS}"
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(collection)
            .bind(id)
            .bind(Json(patch))
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(collection, id))?;
        Ok(record.to_domain())
    }

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> PortResult<Vec<StoredDocument>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND data @> $2 ORDER BY seq ASC"
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(collection)
            .bind(Json(containment(filters)))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
