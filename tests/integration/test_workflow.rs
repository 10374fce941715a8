//! End-to-end tests of the configurator HTTP API.
//!
//! Each test spawns a real server backed by a file store in a temporary
//! directory and a canned generation transport, then drives it the way a
//! front end would.

use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use workbench_app::{
    create_router, App, AppState, AttemptError, BackoffCaller, Config, GenerateContentRequest,
    GenerateContentResponse, GenerationTransport, LocalAuthProvider, RetryPolicy, SessionManager,
};
use workbench_store::{FileStore, ProjectGateway};

const MATERIALS: &str = r#"{"materials":["2x 1x12 oak boards, 36 in","1.5 in wood screws"],"tools":["Drill","Tape measure"]}"#;
const STEPS: &str = r#"{"steps":["Cut the sides to 24 in.","Drill pilot holes.","Screw the shelves in place."]}"#;

/// Answers materials and instruction prompts with fixed JSON.
#[derive(Debug, Default)]
struct CannedTransport {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl GenerationTransport for CannedTransport {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AttemptError::Status(500));
        }
        let prompt = request.prompt().unwrap_or_default();
        let text = if prompt.contains("step-by-step") {
            STEPS
        } else {
            MATERIALS
        };
        Ok(GenerateContentResponse::from_text(text))
    }
}

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

struct TestServer {
    base_url: String,
    http: reqwest::Client,
    transport: Arc<CannedTransport>,
    store_dir: TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn post(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut request = self.http.post(format!("{}{path}", self.base_url));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("Request failed");
        let status = response.status().as_u16();
        (status, response.json().await.expect("Invalid JSON body"))
    }

    async fn get_view(&self) -> Value {
        self.http
            .get(format!("{}/api/view", self.base_url))
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Invalid JSON body")
    }

    fn generation_calls(&self) -> usize {
        self.transport.calls.load(Ordering::SeqCst)
    }
}

/// Spawns a server whose sign-in uses `token`.
async fn spawn_server(token: &str, transport: CannedTransport) -> TestServer {
    let store_dir = TempDir::new().expect("Failed to create temp dir");
    let transport = Arc::new(transport);

    let gateway = ProjectGateway::new(Arc::new(FileStore::new(store_dir.path())), "test-app");
    let policy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(5),
    };
    let caller = BackoffCaller::new(transport.clone(), policy);
    let sessions = SessionManager::new(Arc::new(LocalAuthProvider), Some(token.to_string()));
    let state = AppState::new(Config::default(), App::new(gateway, caller, sessions));

    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base_url: format!("http://{addr}"),
        http: reqwest::Client::new(),
        transport,
        store_dir,
        _handle: handle,
    }
}

fn shelf_form() -> Value {
    json!({
        "projectType": "shelf",
        "woodType": "oak",
        "screwLength": "1.5",
        "height": "24",
        "width": "36",
        "depth": "12"
    })
}

fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    serde_json::from_str(&text).expect("Stored document is not JSON")
}

// ============================================================================
// Configurator Flow
// ============================================================================

/// Tests the full save flow: sign in, submit, materials, then instructions.
#[tokio::test]
async fn test_submit_project_end_to_end() {
    let server = spawn_server("builder-1", CannedTransport::default()).await;

    let (status, view) = server.post("/api/session/login", None).await;
    assert_eq!(status, 200);
    assert_eq!(view["loginLabel"], "Logout");
    assert_eq!(view["home"]["linksActive"], false);

    let (status, view) = server
        .post("/api/configurator/submit", Some(shelf_form()))
        .await;
    assert_eq!(status, 200);
    assert_eq!(view["visible"], "materials");
    assert_eq!(view["materials"]["title"], "Project: SHELF (36x24x12 in)");
    assert_eq!(view["materials"]["showOutput"], true);
    assert_eq!(view["materials"]["tools"], json!(["Drill", "Tape measure"]));
    assert_eq!(view["configurator"]["submitting"], false);

    let project_id = view["materials"]["projectId"]
        .as_str()
        .expect("materials page has a project id")
        .to_string();

    let (_, view) = server
        .post(
            "/api/navigate",
            Some(json!({ "page": "instructions", "projectId": project_id })),
        )
        .await;
    assert_eq!(view["visible"], "instructions");
    assert_eq!(view["instructions"]["title"], "Instructions: SHELF Build");
    assert_eq!(view["instructions"]["steps"].as_array().map(Vec::len), Some(3));
    assert_eq!(server.generation_calls(), 2);
}

/// Tests that a save writes one project and one pointer at the documented paths.
#[tokio::test]
async fn test_saved_documents_layout() {
    let server = spawn_server("builder-2", CannedTransport::default()).await;
    server.post("/api/session/login", None).await;

    let (_, view) = server
        .post("/api/configurator/submit", Some(shelf_form()))
        .await;
    let project_id = view["materials"]["projectId"].as_str().unwrap().to_string();

    let user_dir = server
        .store_dir
        .path()
        .join("artifacts/test-app/users/builder-2");

    let pointer = read_json(&user_dir.join("config/latest.json"));
    assert_eq!(pointer["latestProjectId"], project_id.as_str());
    assert!(pointer["updatedAt"].is_string());

    let project = read_json(&user_dir.join(format!("projects/{project_id}.json")));
    assert_eq!(project["projectType"], "shelf");
    assert_eq!(project["woodType"], "oak");
    assert_eq!(project["screwLength"], 1.5);
    assert_eq!(project["userId"], "builder-2");
    assert!(project["createdAt"].is_string());

    let projects = std::fs::read_dir(user_dir.join("projects"))
        .unwrap()
        .count();
    assert_eq!(projects, 1);
}

/// Tests that home links follow the latest project and reset on logout.
#[tokio::test]
async fn test_home_links_follow_session() {
    let server = spawn_server("builder-3", CannedTransport::default()).await;
    server.post("/api/session/login", None).await;

    let (_, view) = server
        .post("/api/home/link", Some(json!({ "target": "materials" })))
        .await;
    assert_eq!(
        view["status"]["message"],
        "Please start a project in the configurator first!"
    );

    server
        .post("/api/configurator/submit", Some(shelf_form()))
        .await;

    let (_, view) = server
        .post("/api/navigate", Some(json!({ "page": "home" })))
        .await;
    assert_eq!(view["home"]["linksActive"], true);

    let (_, view) = server
        .post("/api/home/link", Some(json!({ "target": "instructions" })))
        .await;
    assert_eq!(view["visible"], "instructions");

    let (status, view) = server.post("/api/session/logout", None).await;
    assert_eq!(status, 200);
    assert_eq!(view["visible"], "home");
    assert_eq!(view["loginLabel"], "Login");
    assert_eq!(view["home"]["linksActive"], false);
}

/// Tests that a new session for the same user sees the stored pointer.
#[tokio::test]
async fn test_latest_project_survives_relogin() {
    let server = spawn_server("builder-4", CannedTransport::default()).await;
    server.post("/api/session/login", None).await;
    let (_, saved) = server
        .post("/api/configurator/submit", Some(shelf_form()))
        .await;

    server.post("/api/session/logout", None).await;
    let (_, view) = server.post("/api/session/login", None).await;

    assert_eq!(view["home"]["linksActive"], true);
    assert_eq!(
        view["home"]["latestProjectId"],
        saved["materials"]["projectId"]
    );
}

// ============================================================================
// Failure Paths
// ============================================================================

/// Tests that submitting before sign-in writes nothing.
#[tokio::test]
async fn test_submit_before_login_is_rejected() {
    let server = spawn_server("builder-5", CannedTransport::default()).await;

    let (status, view) = server
        .post("/api/configurator/submit", Some(shelf_form()))
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        view["status"]["message"],
        "Authentication not ready. Please try again."
    );
    assert!(!server.store_dir.path().join("artifacts").exists());
}

/// Tests that a failing generator leaves the project saved and the page in error.
#[tokio::test]
async fn test_generation_failure_after_save() {
    let transport = CannedTransport {
        fail: true,
        ..CannedTransport::default()
    };
    let server = spawn_server("builder-6", transport).await;
    server.post("/api/session/login", None).await;

    let (_, view) = server
        .post("/api/configurator/submit", Some(shelf_form()))
        .await;
    assert_eq!(view["visible"], "materials");
    assert_eq!(view["materials"]["loading"], false);
    assert_eq!(view["materials"]["showOutput"], false);
    assert_eq!(
        view["status"]["message"],
        "Failed to generate materials list. Check logs."
    );
    assert_eq!(server.generation_calls(), 2);

    let pointer = read_json(
        &server
            .store_dir
            .path()
            .join("artifacts/test-app/users/builder-6/config/latest.json"),
    );
    assert_eq!(pointer["latestProjectId"], view["materials"]["projectId"]);
}

/// Tests redirects for missing and unknown projects.
#[tokio::test]
async fn test_navigation_redirects() {
    let server = spawn_server("builder-7", CannedTransport::default()).await;
    server.post("/api/session/login", None).await;

    let (_, view) = server
        .post("/api/navigate", Some(json!({ "page": "materials" })))
        .await;
    assert_eq!(view["visible"], "home");
    assert_eq!(
        view["status"]["message"],
        "Cannot navigate: No Project ID provided. Redirecting to home."
    );

    let (_, view) = server
        .post(
            "/api/navigate",
            Some(json!({ "page": "materials", "projectId": "does-not-exist" })),
        )
        .await;
    assert_eq!(view["visible"], "home");
    assert_eq!(view["status"]["message"], "Project not found.");

    let (_, view) = server
        .post("/api/navigate", Some(json!({ "page": "gallery" })))
        .await;
    assert_eq!(view["visible"], "home");

    assert_eq!(server.generation_calls(), 0);
}

/// Tests that the session endpoints reject transitions from the wrong state.
#[tokio::test]
async fn test_session_conflicts() {
    let server = spawn_server("builder-8", CannedTransport::default()).await;

    let (status, body) = server.post("/api/session/logout", None).await;
    assert_eq!(status, 409);
    assert!(body["error"].as_str().unwrap().contains("session transition"));

    server.post("/api/session/login", None).await;
    let (status, _) = server.post("/api/session/login", None).await;
    assert_eq!(status, 409);

    let view = server.get_view().await;
    assert_eq!(view["loginLabel"], "Logout");
}
