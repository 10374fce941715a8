//! Workbench configurator service.
//!
//! Drives the woodworking configurator: session handling, page navigation,
//! project saving, and the generation of materials lists and build steps.
//! The state is exposed over an HTTP API and a WebSocket event stream.

pub mod api;
pub mod config;
pub mod controllers;
pub mod error;
pub mod events;
pub mod generation;
pub mod router;
pub mod session;
pub mod view;

pub use api::{create_router, AppState, ErrorResponse, LinkRequest, NavigateRequest};
pub use config::{Config, GenerationConfig};
pub use controllers::ProjectForm;
pub use error::{AppError, Result};
pub use events::{EventBroadcaster, ViewEvent};
pub use generation::{
    AttemptError, BackoffCaller, BuildSteps, GenerateContentRequest, GenerateContentResponse,
    GenerationError, GenerationTransport, HttpTransport, MaterialsList, RetryPolicy,
};
pub use router::{App, AppContext};
pub use session::{AuthProvider, LocalAuthProvider, SessionManager, SessionState};
pub use view::{Page, StatusBanner, ViewModel};
