//! services/api/src/adapters/memory.rs
//!
//! An in-process `DocumentStore`, used when no database is configured and by
//! the integration tests.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use simricare_core::domain::{new_document_id, FieldFilter, StoredDocument};
use simricare_core::ports::{DocumentStore, PortError, PortResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Documents per collection, kept in insertion order.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

fn not_found(collection: &str, id: &str) -> PortError {
    PortError::NotFound(format!("Document {}/{} not found", collection, id))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> PortResult<StoredDocument> {
        if !data.is_object() {
            return Err(PortError::Invalid("document data must be an object".to_string()));
        }
        let now = Utc::now();
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if let Some(existing) = id.and_then(|id| docs.iter_mut().find(|d| d.id == id)) {
            existing.data = data;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let doc = StoredDocument {
            id: id.map(str::to_string).unwrap_or_else(new_document_id),
            collection: collection.to_string(),
            data,
            created_at: now,
            updated_at: now,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: &str) -> PortResult<StoredDocument> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> PortResult<StoredDocument> {
        let Value::Object(fields) = patch else {
            return Err(PortError::Invalid("update patch must be an object".to_string()));
        };
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| not_found(collection, id))?;

        if let Value::Object(data) = &mut doc.data {
            data.extend(fields);
        }
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()> {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
    ) -> PortResult<Vec<StoredDocument>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| filters.iter().all(|f| f.matches(&d.data)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
