//! On-disk document store.
//!
//! Each document is a pretty-printed JSON file. A document at
//! `artifacts/app/users/u1/config/latest` lives at
//! `<root>/artifacts/app/users/u1/config/latest.json`.
//!
//! Writes go to a sibling `.tmp` file which is then renamed over the target,
//! so readers never observe a half-written document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    new_document_id, CollectionPath, Document, DocumentPath, DocumentStore, Result, StoreError,
};

/// Document store backed by a directory tree.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serializes read-modify-write cycles in `merge`.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &DocumentPath) -> PathBuf {
        let mut file = self.root.clone();
        let (id, dirs) = path
            .segments()
            .split_last()
            .map_or(("", &[][..]), |(id, dirs)| (id.as_str(), dirs));
        for dir in dirs {
            file.push(dir);
        }
        file.push(format!("{id}.json"));
        file
    }

    async fn read(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let file = self.file_path(path);
        let contents = match tokio::fs::read_to_string(&file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, file, e)),
        };

        serde_json::from_str::<Document>(&contents)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    async fn write(&self, path: &DocumentPath, doc: &Document) -> Result<()> {
        let file = self.file_path(path);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, parent.to_path_buf(), e))?;
        }

        let json = serde_json::to_string_pretty(doc)?;
        let tmp = file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_error(path, tmp.clone(), e))?;
        tokio::fs::rename(&tmp, &file)
            .await
            .map_err(|e| io_error(path, file.clone(), e))?;

        debug!(path = %path, file = %file.display(), "Wrote document");
        Ok(())
    }
}

fn io_error(path: &DocumentPath, file: PathBuf, source: std::io::Error) -> StoreError {
    if source.kind() == ErrorKind::PermissionDenied {
        StoreError::PermissionDenied {
            path: path.to_string(),
        }
    } else {
        StoreError::Io { path: file, source }
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.read(path).await
    }

    async fn add(&self, collection: &CollectionPath, doc: Document) -> Result<String> {
        let id = new_document_id();
        let path = collection.doc(id.clone())?;
        let _guard = self.write_lock.lock().await;
        self.write(&path, &doc).await?;
        Ok(id)
    }

    async fn merge(&self, path: &DocumentPath, doc: Document) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read(path).await?.unwrap_or_default();
        current.extend(doc);
        self.write(path, &current).await
    }
}
