//! Page workflows.
//!
//! Controllers never touch the view model. They return values that
//! [`App`](crate::App) applies, so a stale result can be dropped before it
//! is rendered.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use workbench_store::{LatestProject, NewProject, Project, ProjectGateway};

use crate::error::{AppError, Result};
use crate::generation::{
    instructions_request, materials_request, BackoffCaller, BuildSteps, MaterialsList,
};

/// Status shown when a required form field is blank.
pub const MSG_MISSING_FIELDS: &str = "Please fill out all required fields.";
/// Status shown when a numeric form field does not parse.
pub const MSG_INVALID_NUMBERS: &str =
    "Please enter valid numbers for the dimensions and screw length.";

// ============================================================================
// Configurator
// ============================================================================

/// Raw configurator form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectForm {
    /// Kind of build.
    pub project_type: String,
    /// Wood species.
    pub wood_type: String,
    /// Screw length in inches.
    pub screw_length: String,
    /// Height in inches.
    pub height: String,
    /// Width in inches.
    pub width: String,
    /// Depth in inches.
    pub depth: String,
}

impl ProjectForm {
    /// Checks presence, then numeric format, and returns the project fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` with the message to show the user.
    pub fn validate(&self) -> Result<NewProject> {
        let fields = [
            &self.project_type,
            &self.wood_type,
            &self.screw_length,
            &self.height,
            &self.width,
            &self.depth,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::validation(MSG_MISSING_FIELDS));
        }

        let number = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| AppError::validation(MSG_INVALID_NUMBERS))
        };

        Ok(NewProject {
            project_type: self.project_type.trim().to_string(),
            wood_type: self.wood_type.trim().to_string(),
            screw_length: number(&self.screw_length)?,
            height: number(&self.height)?,
            width: number(&self.width)?,
            depth: number(&self.depth)?,
        })
    }
}

// ============================================================================
// Materials and Instructions
// ============================================================================

/// Rendered content of the materials page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialsPage {
    /// Heading, e.g. `Project: SHELF (36x24x12 in)`.
    pub title: String,
    /// Generated lists.
    pub list: MaterialsList,
}

/// Rendered content of the instructions page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionsPage {
    /// Heading, e.g. `Instructions: SHELF Build`.
    pub title: String,
    /// Generated steps.
    pub steps: Vec<String>,
}

/// Outcome of loading a project page.
#[derive(Debug)]
pub enum PageLoad<T> {
    /// The page is ready.
    Ready(T),
    /// The project does not exist.
    ProjectNotFound,
    /// Loading failed after the project may have been found.
    Failed {
        /// Heading to keep showing, if the project was read.
        title: Option<String>,
        /// Cause, for the log.
        error: AppError,
    },
}

/// Heading of the materials page.
#[must_use]
pub fn materials_title(project: &Project) -> String {
    format!(
        "Project: {} ({}x{}x{} in)",
        project.project_type.to_uppercase(),
        project.width,
        project.height,
        project.depth
    )
}

/// Heading of the instructions page.
#[must_use]
pub fn instructions_title(project: &Project) -> String {
    format!("Instructions: {} Build", project.project_type.to_uppercase())
}

async fn load_project<T>(
    gateway: &ProjectGateway,
    owner: Option<&str>,
    project_id: &str,
) -> std::result::Result<Project, PageLoad<T>> {
    let Some(owner) = owner else {
        return Err(PageLoad::Failed {
            title: None,
            error: AppError::NotAuthenticated,
        });
    };

    match gateway.get_project(owner, project_id).await {
        Ok(Some(project)) => Ok(project),
        Ok(None) => {
            warn!(project_id, "Project not found");
            Err(PageLoad::ProjectNotFound)
        }
        Err(e) => Err(PageLoad::Failed {
            title: None,
            error: e.into(),
        }),
    }
}

/// Loads a project and generates its materials and tools lists.
pub async fn load_materials(
    gateway: &ProjectGateway,
    caller: &BackoffCaller,
    owner: Option<&str>,
    project_id: &str,
    cancel: &CancellationToken,
) -> PageLoad<MaterialsPage> {
    let project = match load_project(gateway, owner, project_id).await {
        Ok(project) => project,
        Err(load) => return load,
    };

    let title = materials_title(&project);
    match caller
        .call::<MaterialsList>(&materials_request(&project), cancel)
        .await
    {
        Ok(list) => PageLoad::Ready(MaterialsPage { title, list }),
        Err(e) => {
            error!(project_id, error = %e, "Error setting up materials");
            PageLoad::Failed {
                title: Some(title),
                error: e.into(),
            }
        }
    }
}

/// Loads a project and generates its build steps.
pub async fn load_instructions(
    gateway: &ProjectGateway,
    caller: &BackoffCaller,
    owner: Option<&str>,
    project_id: &str,
    cancel: &CancellationToken,
) -> PageLoad<InstructionsPage> {
    let project = match load_project(gateway, owner, project_id).await {
        Ok(project) => project,
        Err(load) => return load,
    };

    let title = instructions_title(&project);
    match caller
        .call::<BuildSteps>(&instructions_request(&project), cancel)
        .await
    {
        Ok(BuildSteps { steps }) => PageLoad::Ready(InstructionsPage { title, steps }),
        Err(e) => {
            error!(project_id, error = %e, "Error setting up instructions");
            PageLoad::Failed {
                title: Some(title),
                error: e.into(),
            }
        }
    }
}

// ============================================================================
// Home
// ============================================================================

/// Looks up the project the home links should open.
///
/// Read failures are logged and treated as "no project".
pub async fn latest_project(gateway: &ProjectGateway, owner: &str) -> Option<String> {
    match gateway.latest_project_id(owner).await {
        LatestProject::Found(id) => Some(id),
        LatestProject::NotFound => None,
        LatestProject::Error(e) => {
            error!(error = %e, "Unexpected error fetching latest project id");
            None
        }
    }
}
