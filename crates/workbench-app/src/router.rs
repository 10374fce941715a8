//! The application root.
//!
//! [`App`] owns the app context (session and cached latest project id), the
//! view model, and the collaborators that act on them. Every user intent is
//! a method here; each returns the view model after the intent completed.
//!
//! Navigation is sequenced: every [`App::navigate`] call takes the next
//! sequence number and cancels the generation request of the previous one.
//! An asynchronous page setup only renders if its sequence number is still
//! the latest.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use workbench_store::{DocumentStore, FileStore, MemoryStore, ProjectGateway};

use crate::config::Config;
use crate::controllers::{
    latest_project, load_instructions, load_materials, InstructionsPage, MaterialsPage, PageLoad,
    ProjectForm,
};
use crate::error::{AppError, Result};
use crate::events::{EventBroadcaster, ViewEvent};
use crate::generation::{BackoffCaller, HttpTransport};
use crate::session::{LocalAuthProvider, SessionManager, SessionState};
use crate::view::{Page, StatusBanner, ViewModel, SUBMIT_BUSY_LABEL, SUBMIT_LABEL};

/// Raised when a project page is opened without a project id.
pub const MSG_NO_PROJECT_ID: &str = "Cannot navigate: No Project ID provided. Redirecting to home.";
/// Raised when the requested project does not exist.
pub const MSG_PROJECT_NOT_FOUND: &str = "Project not found.";
/// Raised when a home link is used before any project was saved.
pub const MSG_START_PROJECT_FIRST: &str = "Please start a project in the configurator first!";
/// Raised when a submission arrives while another is saving.
pub const MSG_SAVE_IN_PROGRESS: &str = "A save is already in progress.";

const MSG_SAVING: &str = "Saving project...";
const MSG_SAVED: &str = "Project saved successfully! Generating materials list...";
const MSG_SAVE_FAILED: &str = "Failed to save project. Check logs.";
const MSG_MATERIALS_FAILED: &str = "Failed to generate materials list. Check logs.";
const MSG_INSTRUCTIONS_FAILED: &str = "Failed to generate instructions. Check logs.";
const MSG_LOGIN_FAILED: &str = "Login failed. See logs for details.";
const MSG_LOGOUT_FAILED: &str = "Logout failed. See logs for details.";

/// Session and navigation state shared by the workflows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppContext {
    /// Who is signed in.
    pub session: SessionState,
    /// Project the home links open.
    pub latest_project_id: Option<String>,
}

/// View model plus the bookkeeping of the navigation that owns it.
#[derive(Debug)]
struct ViewState {
    model: ViewModel,
    seq: u64,
    inflight: CancellationToken,
}

/// Result of a page setup routine.
enum Setup {
    Done,
    Redirect(StatusBanner),
}

/// The configurator application.
#[derive(Debug)]
pub struct App {
    context: Mutex<AppContext>,
    state: Mutex<ViewState>,
    session_gate: Mutex<()>,
    sessions: SessionManager,
    gateway: ProjectGateway,
    caller: BackoffCaller,
    events: EventBroadcaster,
    status_ttl: Duration,
    shutdown: CancellationToken,
}

impl App {
    /// Creates an app in the anonymous state showing the home page.
    pub fn new(gateway: ProjectGateway, caller: BackoffCaller, sessions: SessionManager) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            context: Mutex::new(AppContext::default()),
            state: Mutex::new(ViewState {
                model: ViewModel::default(),
                seq: 0,
                inflight: shutdown.child_token(),
            }),
            session_gate: Mutex::new(()),
            sessions,
            gateway,
            caller,
            events: EventBroadcaster::default(),
            status_ttl: Duration::from_secs(5),
            shutdown,
        }
    }

    /// Sets how long status messages stay visible.
    #[must_use]
    pub fn with_status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self
    }

    /// Builds the app described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match &config.store_dir {
            Some(dir) => {
                info!(dir = %dir, "Using file store");
                Arc::new(FileStore::new(dir))
            }
            None => {
                info!("Using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        let gateway = ProjectGateway::new(store, config.app_id.clone());
        let transport = HttpTransport::new(&config.generation)?;
        let caller = BackoffCaller::new(Arc::new(transport), config.generation.retry_policy());
        let sessions = SessionManager::new(
            Arc::new(LocalAuthProvider),
            config.initial_auth_token.clone(),
        );

        Ok(Self::new(gateway, caller, sessions).with_status_ttl(config.status_ttl()))
    }

    /// Shows the home page, then signs in.
    pub async fn start(&self) -> ViewModel {
        self.navigate(Page::Home, None).await;
        match self.login().await {
            Ok(view) => view,
            Err(e) => {
                warn!(error = %e, "Startup sign-in skipped");
                self.view().await
            }
        }
    }

    /// Returns the current view model with an expired status removed.
    pub async fn view(&self) -> ViewModel {
        let state = self.state.lock().await;
        state.model.snapshot(Utc::now(), self.status_ttl)
    }

    /// Returns a copy of the app context.
    pub async fn context(&self) -> AppContext {
        self.context.lock().await.clone()
    }

    /// The broadcaster carrying this app's view events.
    #[must_use]
    pub const fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Cancels every in-flight generation request.
    pub fn shutdown(&self) {
        info!("Cancelling in-flight work");
        self.shutdown.cancel();
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigates by page name. Unknown names go home.
    pub async fn navigate_to(&self, name: &str, project_id: Option<&str>) -> ViewModel {
        if let Some(page) = Page::from_name(name) {
            self.navigate(page, project_id).await
        } else {
            warn!(page = name, "Unknown page, redirecting home");
            self.navigate(Page::Home, None).await
        }
    }

    /// Shows `page` and runs its setup routine.
    pub async fn navigate(&self, page: Page, project_id: Option<&str>) -> ViewModel {
        self.navigate_carrying(page, project_id.map(str::to_string), None)
            .await
    }

    /// Navigates and raises `carried` on the new page.
    ///
    /// Showing a page clears the status, so messages that announce a
    /// navigation travel with it.
    async fn navigate_carrying(
        &self,
        page: Page,
        project_id: Option<String>,
        carried: Option<StatusBanner>,
    ) -> ViewModel {
        let mut target = (page, project_id);
        let mut carried = carried;

        loop {
            let (page, project_id) = target;
            let (seq, cancel) = self.begin_navigation(page, carried.take()).await;

            match self.setup(page, project_id.as_deref(), seq, &cancel).await {
                Setup::Done => break,
                Setup::Redirect(banner) => {
                    debug!(from = %page, "Redirecting home");
                    target = (Page::Home, None);
                    carried = Some(banner);
                }
            }
        }

        self.view().await
    }

    async fn begin_navigation(
        &self,
        page: Page,
        carried: Option<StatusBanner>,
    ) -> (u64, CancellationToken) {
        let (seq, cancel) = {
            let mut state = self.state.lock().await;
            state.inflight.cancel();
            state.inflight = self.shutdown.child_token();
            state.seq += 1;
            state.model.show(page);
            if let Some(banner) = &carried {
                state.model.raise(banner.clone());
            }
            (state.seq, state.inflight.clone())
        };

        debug!(page = %page, seq, "Navigating");
        self.events.send(ViewEvent::navigated(page, seq));
        if let Some(banner) = carried {
            self.events.send(ViewEvent::status(banner));
        }
        (seq, cancel)
    }

    async fn setup(
        &self,
        page: Page,
        project_id: Option<&str>,
        seq: u64,
        cancel: &CancellationToken,
    ) -> Setup {
        if page.requires_project() && project_id.is_none_or(|id| id.trim().is_empty()) {
            warn!(page = %page, "Navigation without a project id");
            return Setup::Redirect(StatusBanner::error(MSG_NO_PROJECT_ID));
        }

        match (page, project_id) {
            (Page::Home, _) => self.setup_home(seq).await,
            (Page::Configurator, _) => {
                self.render(seq, page, |_| {}).await;
                Setup::Done
            }
            (Page::Materials, Some(id)) => self.setup_materials(id, seq, cancel).await,
            (Page::Instructions, Some(id)) => self.setup_instructions(id, seq, cancel).await,
            (Page::Materials | Page::Instructions, None) => {
                Setup::Redirect(StatusBanner::error(MSG_NO_PROJECT_ID))
            }
        }
    }

    async fn setup_home(&self, seq: u64) -> Setup {
        let session = self.context.lock().await.session.clone();
        let latest = match session.uid() {
            Some(uid) => latest_project(&self.gateway, uid).await,
            None => None,
        };

        {
            let mut context = self.context.lock().await;
            // A sign-out while the lookup ran already cleared the cache.
            if context.session == session {
                context.latest_project_id.clone_from(&latest);
            }
        }

        self.render(seq, Page::Home, |view| {
            view.home.links_active = latest.is_some();
            view.home.latest_project_id = latest;
        })
        .await;
        Setup::Done
    }

    async fn setup_materials(&self, project_id: &str, seq: u64, cancel: &CancellationToken) -> Setup {
        if !self
            .apply_if_current(seq, |view| view.materials.start_loading(project_id))
            .await
        {
            return Setup::Done;
        }

        let owner = self.owner().await;
        let load = load_materials(
            &self.gateway,
            &self.caller,
            owner.as_deref(),
            project_id,
            cancel,
        )
        .await;

        match load {
            PageLoad::Ready(MaterialsPage { title, list }) => {
                self.render(seq, Page::Materials, |view| {
                    let panel = &mut view.materials;
                    panel.title = title;
                    panel.materials = list.materials;
                    panel.tools = list.tools;
                    panel.loading = false;
                    panel.show_output = true;
                })
                .await;
                Setup::Done
            }
            PageLoad::ProjectNotFound => self.redirect_if_current(seq).await,
            PageLoad::Failed { title, error } => {
                error!(project_id, error = %error, "Materials page failed");
                self.render(seq, Page::Materials, |view| {
                    let panel = &mut view.materials;
                    if let Some(title) = title {
                        panel.title = title;
                    }
                    panel.loading = false;
                    panel.show_output = false;
                    view.raise(StatusBanner::error(MSG_MATERIALS_FAILED));
                })
                .await;
                Setup::Done
            }
        }
    }

    async fn setup_instructions(
        &self,
        project_id: &str,
        seq: u64,
        cancel: &CancellationToken,
    ) -> Setup {
        if !self
            .apply_if_current(seq, |view| view.instructions.start_loading(project_id))
            .await
        {
            return Setup::Done;
        }

        let owner = self.owner().await;
        let load = load_instructions(
            &self.gateway,
            &self.caller,
            owner.as_deref(),
            project_id,
            cancel,
        )
        .await;

        match load {
            PageLoad::Ready(InstructionsPage { title, steps }) => {
                self.render(seq, Page::Instructions, |view| {
                    let panel = &mut view.instructions;
                    panel.title = title;
                    panel.steps = steps;
                    panel.loading = false;
                    panel.show_output = true;
                })
                .await;
                Setup::Done
            }
            PageLoad::ProjectNotFound => self.redirect_if_current(seq).await,
            PageLoad::Failed { title, error } => {
                error!(project_id, error = %error, "Instructions page failed");
                self.render(seq, Page::Instructions, |view| {
                    let panel = &mut view.instructions;
                    if let Some(title) = title {
                        panel.title = title;
                    }
                    panel.loading = false;
                    panel.show_output = false;
                    view.raise(StatusBanner::error(MSG_INSTRUCTIONS_FAILED));
                })
                .await;
                Setup::Done
            }
        }
    }

    async fn redirect_if_current(&self, seq: u64) -> Setup {
        if self.state.lock().await.seq == seq {
            Setup::Redirect(StatusBanner::error(MSG_PROJECT_NOT_FOUND))
        } else {
            Setup::Done
        }
    }

    /// Applies `update` unless a newer navigation started. Returns whether it ran.
    async fn apply_if_current<F>(&self, seq: u64, update: F) -> bool
    where
        F: FnOnce(&mut ViewModel),
    {
        let mut state = self.state.lock().await;
        if state.seq != seq {
            debug!(seq, latest = state.seq, "Dropping stale page update");
            return false;
        }
        update(&mut state.model);
        true
    }

    /// Applies the final update of a page setup and announces it.
    async fn render<F>(&self, seq: u64, page: Page, update: F)
    where
        F: FnOnce(&mut ViewModel),
    {
        let status_before = self.state.lock().await.model.status.clone();
        if !self.apply_if_current(seq, update).await {
            return;
        }

        let view = self.view().await;
        if view.status.is_some() && view.status != status_before {
            if let Some(banner) = view.status.clone() {
                self.events.send(ViewEvent::status(banner));
            }
        }
        self.events.send(ViewEvent::rendered(page, view));
    }

    /// Follows a home link to the cached latest project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if `target` is not a project page.
    pub async fn open_project_link(&self, target: Page) -> Result<ViewModel> {
        if !target.requires_project() {
            return Err(AppError::validation(format!(
                "'{target}' is not a project page"
            )));
        }

        let latest = self.context.lock().await.latest_project_id.clone();
        match latest {
            Some(id) => Ok(self.navigate(target, Some(&id)).await),
            None => {
                self.raise(StatusBanner::error(MSG_START_PROJECT_FIRST)).await;
                Ok(self.view().await)
            }
        }
    }

    // ========================================================================
    // Configurator
    // ========================================================================

    /// Validates and saves a project, then opens its materials page.
    pub async fn submit_project(&self, form: &ProjectForm) -> ViewModel {
        let project = match form.validate() {
            Ok(project) => project,
            Err(e) => {
                debug!(error = %e, "Rejected project form");
                self.raise(StatusBanner::error(e.to_string())).await;
                return self.view().await;
            }
        };

        let Some(owner) = self.owner().await else {
            self.raise(StatusBanner::error(AppError::NotAuthenticated.to_string()))
                .await;
            return self.view().await;
        };

        let claimed = {
            let mut state = self.state.lock().await;
            let panel = &mut state.model.configurator;
            if panel.submitting {
                false
            } else {
                panel.submitting = true;
                panel.submit_label = SUBMIT_BUSY_LABEL.to_string();
                true
            }
        };
        if !claimed {
            warn!("Submission while a save is in flight");
            self.raise(StatusBanner::error(MSG_SAVE_IN_PROGRESS)).await;
            return self.view().await;
        }

        self.raise(StatusBanner::info(MSG_SAVING)).await;
        let saved = self.save_project(&owner, &project).await;

        {
            let mut state = self.state.lock().await;
            let panel = &mut state.model.configurator;
            panel.submitting = false;
            panel.submit_label = SUBMIT_LABEL.to_string();
        }

        match saved {
            Ok(id) => {
                info!(project_id = %id, "Project saved");
                self.navigate_carrying(Page::Materials, Some(id), Some(StatusBanner::info(MSG_SAVED)))
                    .await
            }
            Err(e) => {
                error!(error = %e, "Error saving project");
                self.raise(StatusBanner::error(MSG_SAVE_FAILED)).await;
                self.view().await
            }
        }
    }

    async fn save_project(
        &self,
        owner: &str,
        project: &workbench_store::NewProject,
    ) -> Result<String> {
        let id = self.gateway.create_project(owner, project).await?;

        {
            let mut context = self.context.lock().await;
            if context.session.uid() == Some(owner) {
                context.latest_project_id = Some(id.clone());
            }
        }

        self.gateway.set_latest_project_id(owner, &id).await?;
        Ok(id)
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Signs in and renders home.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSessionTransition` if already signed in.
    /// Provider failures are shown as a status message instead.
    pub async fn login(&self) -> Result<ViewModel> {
        let _gate = self.session_gate.lock().await;
        let current = self.context.lock().await.session.clone();

        match self.sessions.sign_in(&current).await {
            Ok(session) => {
                self.context.lock().await.session = session.clone();
                self.apply_session(session).await;
                Ok(self.navigate(Page::Home, None).await)
            }
            Err(e @ AppError::InvalidSessionTransition { .. }) => Err(e),
            Err(e) => {
                error!(error = %e, "Authentication error");
                self.raise(StatusBanner::error(MSG_LOGIN_FAILED)).await;
                Ok(self.view().await)
            }
        }
    }

    /// Signs out, clears the cached project and renders home.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSessionTransition` if nobody is signed in.
    /// Provider failures are shown as a status message instead.
    pub async fn logout(&self) -> Result<ViewModel> {
        let _gate = self.session_gate.lock().await;
        let current = self.context.lock().await.session.clone();

        match self.sessions.sign_out(&current).await {
            Ok(session) => {
                {
                    let mut context = self.context.lock().await;
                    context.session = session.clone();
                    context.latest_project_id = None;
                }
                {
                    let mut state = self.state.lock().await;
                    state.model.home.links_active = false;
                    state.model.home.latest_project_id = None;
                }
                self.apply_session(session).await;
                Ok(self.navigate(Page::Home, None).await)
            }
            Err(e @ AppError::InvalidSessionTransition { .. }) => Err(e),
            Err(e) => {
                error!(error = %e, "Logout error");
                self.raise(StatusBanner::error(MSG_LOGOUT_FAILED)).await;
                Ok(self.view().await)
            }
        }
    }

    async fn apply_session(&self, session: SessionState) {
        self.state.lock().await.model.login_label = session.login_label().to_string();
        self.events.send(ViewEvent::session_changed(session));
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn owner(&self) -> Option<String> {
        self.context.lock().await.session.uid().map(str::to_string)
    }

    async fn raise(&self, banner: StatusBanner) {
        self.state.lock().await.model.raise(banner.clone());
        self.events.send(ViewEvent::status(banner));
    }
}
