//! Workbench Store
//!
//! Document persistence for the Workbench configurator.
//!
//! The crate is split in two layers:
//!
//! - [`DocumentStore`] - a minimal hierarchical document store in the shape of
//!   a hosted document database (`collection/doc/collection/doc/...`), with a
//!   process-local [`MemoryStore`] and an on-disk [`FileStore`] backend
//! - [`ProjectGateway`] - the typed persistence API the configurator uses:
//!   project records and the per-user "latest project" pointer

pub mod file;
pub mod gateway;
pub mod memory;

pub use file::FileStore;
pub use gateway::{LatestProject, NewProject, Project, ProjectGateway};
pub use memory::MemoryStore;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller is not allowed to access the path.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The document or collection path that was refused.
        path: String,
    },

    /// The backend could not be reached or refused to serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A path had an empty or illegal segment, or the wrong depth.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A stored document could not be decoded.
    #[error("corrupted document at '{path}': {message}")]
    Corrupted {
        /// Path of the unreadable document.
        path: String,
        /// Description of the decoding failure.
        message: String,
    },

    /// Filesystem error in the file backend.
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// File that was being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns `true` for a permission-denied failure.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Paths
// ============================================================================

fn validate_segments<I, S>(segments: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
    for segment in &segments {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains(['/', '\\'])
        {
            return Err(StoreError::InvalidPath(format!(
                "illegal segment '{segment}' in '{}'",
                segments.join("/")
            )));
        }
    }
    Ok(segments)
}

/// Path to a collection: an odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// Builds a collection path, validating every segment.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = validate_segments(segments)?;
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!(
                "collection path needs an odd number of segments: '{}'",
                segments.join("/")
            )));
        }
        Ok(Self { segments })
    }

    /// Returns the path of a document inside this collection.
    pub fn doc(&self, id: impl Into<String>) -> Result<DocumentPath> {
        DocumentPath::new(self.segments.iter().cloned().chain([id.into()]))
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Path to a document: a non-zero even number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// Builds a document path, validating every segment.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = validate_segments(segments)?;
        if segments.is_empty() || segments.len() % 2 != 0 {
            return Err(StoreError::InvalidPath(format!(
                "document path needs an even number of segments: '{}'",
                segments.join("/")
            )));
        }
        Ok(Self { segments })
    }

    /// Returns the document id (the last segment).
    #[must_use]
    pub fn id(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Returns the collection that holds this document.
    #[must_use]
    pub fn parent(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Generates a new random document id.
#[must_use]
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ============================================================================
// DocumentStore
// ============================================================================

/// A hierarchical document store.
///
/// Reads return `Ok(None)` for a missing document; errors are reserved for
/// backend failures and refused access.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Reads a document.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Appends a document under a freshly generated id and returns that id.
    async fn add(&self, collection: &CollectionPath, doc: Document) -> Result<String>;

    /// Upserts a document, overwriting only the fields present in `doc`.
    async fn merge(&self, path: &DocumentPath, doc: Document) -> Result<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn document_path_requires_even_segments() {
        assert!(DocumentPath::new(["artifacts", "app"]).is_ok());
        assert!(DocumentPath::new(["artifacts"]).is_err());
        assert!(DocumentPath::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn collection_path_requires_odd_segments() {
        assert!(CollectionPath::new(["projects"]).is_ok());
        assert!(CollectionPath::new(["artifacts", "app"]).is_err());
    }

    #[test]
    fn paths_reject_illegal_segments() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let err = DocumentPath::new(["users", bad]).unwrap_err();
            assert!(matches!(err, StoreError::InvalidPath(_)), "{bad:?}");
        }
    }

    #[test]
    fn collection_doc_and_parent_round_trip() {
        let collection = CollectionPath::new(["artifacts", "app", "projects"]).unwrap();
        let doc = collection.doc("abc").unwrap();
        assert_eq!(doc.id(), "abc");
        assert_eq!(doc.to_string(), "artifacts/app/projects/abc");
        assert_eq!(doc.parent(), collection);
    }

    #[test]
    fn new_document_id_is_unique_and_url_safe() {
        let a = new_document_id();
        let b = new_document_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn permission_denied_is_detectable() {
        let err = StoreError::PermissionDenied {
            path: "artifacts/x".to_string(),
        };
        assert!(err.is_permission_denied());
        assert!(!StoreError::Unavailable("down".into()).is_permission_denied());
    }
}
