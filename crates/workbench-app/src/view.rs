//! Presentation state of the configurator.
//!
//! The [`ViewModel`] is what a front end renders. Exactly one [`Page`] is
//! visible at a time; the status banner disappears once its TTL has passed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Submit button label while idle.
pub const SUBMIT_LABEL: &str = "Save Project & Get Materials";

/// Submit button label while a save is running.
pub const SUBMIT_BUSY_LABEL: &str = "Processing...";

// ============================================================================
// Page
// ============================================================================

/// A top-level section of the configurator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    /// Landing page with links to the latest project.
    #[default]
    Home,
    /// Project form.
    Configurator,
    /// Generated materials and tools.
    Materials,
    /// Generated build steps.
    Instructions,
}

impl Page {
    /// Every page, in navigation order.
    pub const ALL: [Self; 4] = [
        Self::Home,
        Self::Configurator,
        Self::Materials,
        Self::Instructions,
    ];

    /// Parses a page name as used in URLs and intents.
    ///
    /// # Examples
    ///
    /// ```
    /// use workbench_app::Page;
    ///
    /// assert_eq!(Page::from_name("materials"), Some(Page::Materials));
    /// assert_eq!(Page::from_name("portfolio"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.as_str() == name)
    }

    /// Returns the page name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Configurator => "configurator",
            Self::Materials => "materials",
            Self::Instructions => "instructions",
        }
    }

    /// Returns `true` for pages that display a stored project.
    #[must_use]
    pub const fn requires_project(&self) -> bool {
        matches!(self, Self::Materials | Self::Instructions)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Status Banner
// ============================================================================

/// A transient user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBanner {
    /// Message text.
    pub message: String,
    /// Error styling.
    pub is_error: bool,
    /// When the message was raised.
    pub raised_at: DateTime<Utc>,
}

impl StatusBanner {
    /// An informational message raised now.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
            raised_at: Utc::now(),
        }
    }

    /// An error message raised now.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
            raised_at: Utc::now(),
        }
    }

    /// Returns `true` once `ttl` has elapsed since the banner was raised.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        chrono::Duration::from_std(ttl)
            .is_ok_and(|ttl| now.signed_duration_since(self.raised_at) >= ttl)
    }
}

// ============================================================================
// Panels
// ============================================================================

/// Home page state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePanel {
    /// Whether the materials/instructions links lead to a project.
    pub links_active: bool,
    /// The project the links open.
    pub latest_project_id: Option<String>,
}

/// Configurator form state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguratorPanel {
    /// A save is in flight; the submit control is disabled.
    pub submitting: bool,
    /// Submit control label.
    pub submit_label: String,
}

impl Default for ConfiguratorPanel {
    fn default() -> Self {
        Self {
            submitting: false,
            submit_label: SUBMIT_LABEL.to_string(),
        }
    }
}

/// Materials page state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialsPanel {
    /// Project being shown; the "view instructions" link targets it.
    pub project_id: Option<String>,
    /// Heading text.
    pub title: String,
    /// Generation in progress.
    pub loading: bool,
    /// Lists are ready to show.
    pub show_output: bool,
    /// Cut list and hardware.
    pub materials: Vec<String>,
    /// Required tools.
    pub tools: Vec<String>,
}

/// Instructions page state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionsPanel {
    /// Project being shown.
    pub project_id: Option<String>,
    /// Heading text.
    pub title: String,
    /// Generation in progress.
    pub loading: bool,
    /// Steps are ready to show.
    pub show_output: bool,
    /// Ordered construction steps.
    pub steps: Vec<String>,
}

/// Heading shown while a project loads.
pub(crate) fn loading_title(project_id: &str) -> String {
    format!("Loading Project: {project_id}...")
}

impl MaterialsPanel {
    pub(crate) fn start_loading(&mut self, project_id: &str) {
        *self = Self {
            project_id: Some(project_id.to_string()),
            title: loading_title(project_id),
            loading: true,
            ..Self::default()
        };
    }
}

impl InstructionsPanel {
    pub(crate) fn start_loading(&mut self, project_id: &str) {
        *self = Self {
            project_id: Some(project_id.to_string()),
            title: loading_title(project_id),
            loading: true,
            ..Self::default()
        };
    }
}

// ============================================================================
// View Model
// ============================================================================

/// Everything a front end needs to draw the configurator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    /// The one visible section.
    pub visible: Page,
    /// Login control label: `Login` or `Logout`.
    pub login_label: String,
    /// Current status message, if any.
    pub status: Option<StatusBanner>,
    /// Home page.
    pub home: HomePanel,
    /// Configurator page.
    pub configurator: ConfiguratorPanel,
    /// Materials page.
    pub materials: MaterialsPanel,
    /// Instructions page.
    pub instructions: InstructionsPanel,
    /// Incremented on every navigation; clients scroll to top when it changes.
    pub scroll_to_top: u64,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            visible: Page::Home,
            login_label: "Login".to_string(),
            status: None,
            home: HomePanel::default(),
            configurator: ConfiguratorPanel::default(),
            materials: MaterialsPanel::default(),
            instructions: InstructionsPanel::default(),
            scroll_to_top: 0,
        }
    }
}

impl ViewModel {
    /// Switches to `page`: hides the others, clears the status, resets scroll.
    pub fn show(&mut self, page: Page) {
        self.visible = page;
        self.status = None;
        self.scroll_to_top += 1;
    }

    /// Replaces the status message.
    pub fn raise(&mut self, banner: StatusBanner) {
        self.status = Some(banner);
    }

    /// Returns `true` if `page` is the visible section.
    #[must_use]
    pub fn is_visible(&self, page: Page) -> bool {
        self.visible == page
    }

    /// Returns a copy with an expired status message removed.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> Self {
        let mut view = self.clone();
        if view.status.as_ref().is_some_and(|s| s.is_expired(now, ttl)) {
            view.status = None;
        }
        view
    }
}
