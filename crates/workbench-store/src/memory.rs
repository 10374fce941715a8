//! In-process document store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{new_document_id, CollectionPath, Document, DocumentPath, DocumentStore, Result};

/// Document store held entirely in memory.
///
/// Used by the server when no store directory is configured and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<DocumentPath, Document>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    /// Lists `(id, document)` pairs directly inside a collection.
    pub async fn list(&self, collection: &CollectionPath) -> Vec<(String, Document)> {
        self.docs
            .read()
            .await
            .iter()
            .filter(|(path, _)| &path.parent() == collection)
            .map(|(path, doc)| (path.id().to_string(), doc.clone()))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn add(&self, collection: &CollectionPath, doc: Document) -> Result<String> {
        let id = new_document_id();
        let path = collection.doc(id.clone())?;
        self.docs.write().await.insert(path, doc);
        Ok(id)
    }

    async fn merge(&self, path: &DocumentPath, doc: Document) -> Result<()> {
        let mut docs = self.docs.write().await;
        docs.entry(path.clone()).or_default().extend(doc);
        Ok(())
    }
}
