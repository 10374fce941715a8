//! HTTP API for the configurator.
//!
//! Each endpoint is one user intent and responds with the resulting
//! [`ViewModel`].
//!
//! # Endpoints
//!
//! - `GET /api/view` - Current view model
//! - `POST /api/session/login` - Sign in
//! - `POST /api/session/logout` - Sign out
//! - `POST /api/navigate` - Show a page
//! - `POST /api/home/link` - Follow a home link to the latest project
//! - `POST /api/configurator/submit` - Save a project
//! - `GET /ws` - View event stream
//!
//! # Example
//!
//! ```no_run
//! use workbench_app::{create_router, AppState, Config};
//!
//! # async fn example() -> workbench_app::Result<()> {
//! let state = AppState::from_config(Config::default())?;
//! state.app.start().await;
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::controllers::ProjectForm;
use crate::error::AppError;
use crate::events::ws_handler;
use crate::router::App;
use crate::view::{Page, ViewModel};
use crate::Config;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/navigate`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateRequest {
    /// Page name; unknown names go home.
    pub page: String,
    /// Project for the materials and instructions pages.
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Request body for `POST /api/home/link`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LinkRequest {
    /// `materials` or `instructions`.
    pub target: Page,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration the app was built from.
    pub config: Config,
    /// The application.
    pub app: Arc<App>,
}

impl AppState {
    /// Wraps an existing app.
    #[must_use]
    pub fn new(config: Config, app: App) -> Self {
        Self {
            config,
            app: Arc::new(app),
        }
    }

    /// Builds the app described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the app cannot be built.
    pub fn from_config(config: Config) -> crate::Result<Self> {
        let app = App::from_config(&config)?;
        Ok(Self::new(config, app))
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidSessionTransition { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(status = %status, error = %self.0, "Request rejected");

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router has:
/// - All intent routes under `/api`
/// - The event stream at `/ws`
/// - CORS middleware for development
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/view", get(handle_view))
        .route("/session/login", post(handle_login))
        .route("/session/logout", post(handle_logout))
        .route("/navigate", post(handle_navigate))
        .route("/home/link", post(handle_home_link))
        .route("/configurator/submit", post(handle_submit));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/view`.
async fn handle_view(State(state): State<Arc<AppState>>) -> Json<ViewModel> {
    Json(state.app.view().await)
}

/// Handler for `POST /api/session/login`.
async fn handle_login(State(state): State<Arc<AppState>>) -> Result<Json<ViewModel>, ApiError> {
    info!("Login requested");
    Ok(Json(state.app.login().await?))
}

/// Handler for `POST /api/session/logout`.
async fn handle_logout(State(state): State<Arc<AppState>>) -> Result<Json<ViewModel>, ApiError> {
    info!("Logout requested");
    Ok(Json(state.app.logout().await?))
}

/// Handler for `POST /api/navigate`.
async fn handle_navigate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NavigateRequest>,
) -> Json<ViewModel> {
    info!(page = %request.page, project_id = ?request.project_id, "Navigate requested");
    Json(
        state
            .app
            .navigate_to(&request.page, request.project_id.as_deref())
            .await,
    )
}

/// Handler for `POST /api/home/link`.
async fn handle_home_link(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<ViewModel>, ApiError> {
    info!(page = %request.target, "Home link followed");
    Ok(Json(state.app.open_project_link(request.target).await?))
}

/// Handler for `POST /api/configurator/submit`.
async fn handle_submit(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ProjectForm>,
) -> Json<ViewModel> {
    info!(project_type = %form.project_type, "Project submitted");
    Json(state.app.submit_project(&form).await)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::util::ServiceExt;
    use workbench_store::{MemoryStore, ProjectGateway};

    use super::*;
    use crate::generation::tests::ScriptedTransport;
    use crate::generation::{BackoffCaller, GenerateContentResponse, RetryPolicy};
    use crate::session::tests::CountingProvider;
    use crate::session::SessionManager;

    /// Creates a test state whose generator answers with `replies` in order.
    fn test_state(replies: &[&str]) -> AppState {
        let script = replies
            .iter()
            .map(|text| Ok(GenerateContentResponse::from_text(*text)))
            .collect::<Vec<_>>();
        let gateway = ProjectGateway::new(Arc::new(MemoryStore::new()), "app");
        let caller = BackoffCaller::new(
            Arc::new(ScriptedTransport::new(script)),
            RetryPolicy::default(),
        );
        let sessions = SessionManager::new(Arc::new(CountingProvider::default()), None);
        AppState::new(Config::default(), App::new(gateway, caller, sessions))
    }

    async fn send(
        router: Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    // ------------------------------------------------------------------------
    // View and session
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_view_returns_default_view() {
        let router = create_router(test_state(&[]));
        let (status, json) = send(router, Method::GET, "/api/view", None).await;

        assert_eq!(status, StatusCode::OK);
        let view: ViewModel = serde_json::from_value(json).unwrap();
        assert_eq!(view, ViewModel::default());
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let state = test_state(&[]);
        let router = create_router(state.clone());

        let (status, json) = send(router.clone(), Method::POST, "/api/session/login", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["loginLabel"], "Logout");
        assert_eq!(json["visible"], "home");

        let (status, json) = send(router, Method::POST, "/api/session/logout", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["loginLabel"], "Login");
        assert!(!state.app.context().await.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_while_anonymous_conflicts() {
        let router = create_router(test_state(&[]));
        let (status, json) = send(router, Method::POST, "/api/session/logout", None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("anonymous"));
    }

    #[tokio::test]
    async fn test_double_login_conflicts() {
        let router = create_router(test_state(&[]));
        send(router.clone(), Method::POST, "/api/session/login", None).await;
        let (status, _) = send(router, Method::POST, "/api/session/login", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_navigate_to_configurator() {
        let router = create_router(test_state(&[]));
        let (status, json) = send(
            router,
            Method::POST,
            "/api/navigate",
            Some(serde_json::json!({ "page": "configurator" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["visible"], "configurator");
        assert_eq!(json["configurator"]["submitLabel"], "Save Project & Get Materials");
    }

    #[tokio::test]
    async fn test_navigate_materials_without_id_redirects() {
        let router = create_router(test_state(&[]));
        let (status, json) = send(
            router,
            Method::POST,
            "/api/navigate",
            Some(serde_json::json!({ "page": "materials" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["visible"], "home");
        assert_eq!(
            json["status"]["message"],
            "Cannot navigate: No Project ID provided. Redirecting to home."
        );
        assert_eq!(json["status"]["isError"], true);
    }

    #[tokio::test]
    async fn test_home_link_rejects_non_project_target() {
        let router = create_router(test_state(&[]));
        let (status, json) = send(
            router,
            Method::POST,
            "/api/home/link",
            Some(serde_json::json!({ "target": "home" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    // ------------------------------------------------------------------------
    // Configurator
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_submit_flow_reaches_materials() {
        let state = test_state(&[r#"{"materials":["Plywood sheet"],"tools":["Circular saw"]}"#]);
        let router = create_router(state);
        send(router.clone(), Method::POST, "/api/session/login", None).await;

        let form = serde_json::json!({
            "projectType": "shed",
            "woodType": "cedar",
            "screwLength": "2.5",
            "height": "96",
            "width": "72",
            "depth": "48"
        });
        let (status, json) = send(router, Method::POST, "/api/configurator/submit", Some(form)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["visible"], "materials");
        assert_eq!(json["materials"]["title"], "Project: SHED (72x96x48 in)");
        assert_eq!(json["materials"]["materials"][0], "Plywood sheet");
        assert_eq!(json["materials"]["showOutput"], true);
        assert_eq!(
            json["status"]["message"],
            "Project saved successfully! Generating materials list..."
        );
    }

    #[tokio::test]
    async fn test_submit_missing_fields() {
        let router = create_router(test_state(&[]));
        let (status, json) = send(
            router,
            Method::POST,
            "/api/configurator/submit",
            Some(serde_json::json!({ "projectType": "fence" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"]["message"], "Please fill out all required fields.");
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (AppError::invalid_transition("anonymous", "anonymous"), StatusCode::CONFLICT),
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (AppError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (AppError::auth("offline"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let response = ApiError::from(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
