//! Project persistence gateway.
//!
//! Owns the document layout for the configurator:
//!
//! ```text
//! artifacts/{appId}/users/{userId}/config/latest         { latestProjectId, updatedAt }
//! artifacts/{appId}/users/{userId}/projects/{projectId}  Project
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::{CollectionPath, Document, DocumentPath, DocumentStore, Result, StoreError};

/// Project fields supplied by the configurator form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    /// Kind of build, e.g. `shelf`.
    pub project_type: String,
    /// Wood species.
    pub wood_type: String,
    /// Screw length in inches.
    pub screw_length: f64,
    /// Height in inches.
    pub height: f64,
    /// Width in inches.
    pub width: f64,
    /// Depth in inches.
    pub depth: f64,
}

/// A stored project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Document id; not part of the stored fields.
    #[serde(skip)]
    pub id: String,
    /// Kind of build.
    pub project_type: String,
    /// Wood species.
    pub wood_type: String,
    /// Screw length in inches.
    pub screw_length: f64,
    /// Height in inches.
    pub height: f64,
    /// Width in inches.
    pub width: f64,
    /// Depth in inches.
    pub depth: f64,
    /// Owner uid.
    pub user_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Outcome of reading a user's latest-project pointer.
///
/// A permission failure counts as [`LatestProject::NotFound`]: a brand-new
/// user has no readable pointer yet.
#[derive(Debug)]
pub enum LatestProject {
    /// The pointer names a project.
    Found(String),
    /// No pointer, or an empty one.
    NotFound,
    /// The read failed for another reason.
    Error(StoreError),
}

/// Typed access to projects and latest-project pointers.
#[derive(Debug, Clone)]
pub struct ProjectGateway {
    store: Arc<dyn DocumentStore>,
    app_id: String,
}

impl ProjectGateway {
    /// Creates a gateway over `store`, namespaced by `app_id`.
    pub fn new(store: Arc<dyn DocumentStore>, app_id: impl Into<String>) -> Self {
        Self {
            store,
            app_id: app_id.into(),
        }
    }

    /// Returns the application namespace.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn latest_path(&self, user_id: &str) -> Result<DocumentPath> {
        DocumentPath::new([
            "artifacts",
            self.app_id.as_str(),
            "users",
            user_id,
            "config",
            "latest",
        ])
    }

    fn projects_path(&self, user_id: &str) -> Result<CollectionPath> {
        CollectionPath::new(["artifacts", self.app_id.as_str(), "users", user_id, "projects"])
    }

    /// Reads the id of the user's most recently saved project.
    #[instrument(skip(self))]
    pub async fn latest_project_id(&self, user_id: &str) -> LatestProject {
        let path = match self.latest_path(user_id) {
            Ok(path) => path,
            Err(e) => return LatestProject::Error(e),
        };

        match self.store.get(&path).await {
            Ok(Some(doc)) => match doc.get("latestProjectId").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => LatestProject::Found(id.to_string()),
                _ => {
                    debug!(path = %path, "Latest pointer has no project id");
                    LatestProject::NotFound
                }
            },
            Ok(None) => LatestProject::NotFound,
            Err(e) if e.is_permission_denied() => {
                warn!(path = %path, "No readable latest project for user, treating as none");
                LatestProject::NotFound
            }
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read latest project pointer");
                LatestProject::Error(e)
            }
        }
    }

    /// Stores a new project owned by `owner` and returns its id.
    #[instrument(skip(self, project), fields(project_type = %project.project_type))]
    pub async fn create_project(&self, owner: &str, project: &NewProject) -> Result<String> {
        let record = Project {
            id: String::new(),
            project_type: project.project_type.clone(),
            wood_type: project.wood_type.clone(),
            screw_length: project.screw_length,
            height: project.height,
            width: project.width,
            depth: project.depth,
            user_id: owner.to_string(),
            created_at: Utc::now(),
        };

        let doc = to_document(&record)?;
        let id = self.store.add(&self.projects_path(owner)?, doc).await?;
        info!(project_id = %id, "Project created");
        Ok(id)
    }

    /// Points the user's latest-project pointer at `project_id`.
    ///
    /// Merges into the pointer document, leaving unrelated fields intact.
    #[instrument(skip(self))]
    pub async fn set_latest_project_id(&self, owner: &str, project_id: &str) -> Result<()> {
        let doc = to_document(&json!({
            "latestProjectId": project_id,
            "updatedAt": Utc::now().to_rfc3339(),
        }))?;
        self.store.merge(&self.latest_path(owner)?, doc).await
    }

    /// Reads a project. `Ok(None)` means it does not exist.
    #[instrument(skip(self))]
    pub async fn get_project(&self, owner: &str, project_id: &str) -> Result<Option<Project>> {
        let path = self.projects_path(owner)?.doc(project_id)?;
        let Some(doc) = self.store.get(&path).await? else {
            return Ok(None);
        };

        let mut project: Project =
            serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Corrupted {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        project.id = project_id.to_string();
        Ok(Some(project))
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::Corrupted {
            path: String::new(),
            message: format!("expected an object, got {other}"),
        }),
    }
}
