//! upwatch-api: REST API for upwatch.
//!
//! Axum route handlers over the [`Monitor`]. Mutating routes sit behind a
//! bearer-token middleware; reads are open.
//!
//! # API Routes
//!
//! | Method | Path | Auth | Description |
//! |---|---|---|---|
//! | GET | `/healthz` | | Liveness |
//! | GET | `/api/v1/services` | | List services with live state |
//! | POST | `/api/v1/services` | admin | Create a service |
//! | GET | `/api/v1/services/{id}` | | Service snapshot |
//! | DELETE | `/api/v1/services/{id}` | admin | Delete a service and its history |
//! | POST | `/api/v1/services/{id}/reset` | admin | Clear history, back to unknown |
//! | POST | `/api/v1/services/{id}/check` | admin | Probe now |
//! | GET | `/api/v1/services/{id}/outcomes` | | Recent probe outcomes |
//! | GET | `/api/v1/services/{id}/incidents` | | Recent state changes |

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};

use upwatch_scheduler::Monitor;

pub use auth::AdminAuth;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<Monitor>,
}

/// Build the complete API router.
///
/// With no `admin_token`, every admin route answers 401.
pub fn build_router(monitor: Arc<Monitor>, admin_token: Option<String>) -> Router {
    let state = ApiState { monitor };
    let auth = AdminAuth::new(admin_token);

    let public = Router::new()
        .route("/services", get(handlers::list_services))
        .route("/services/{id}", get(handlers::get_service))
        .route("/services/{id}/outcomes", get(handlers::list_outcomes))
        .route("/services/{id}/incidents", get(handlers::list_incidents));

    let admin = Router::new()
        .route("/services", post(handlers::create_service))
        .route("/services/{id}", delete(handlers::delete_service))
        .route("/services/{id}/reset", post(handlers::reset_service))
        .route("/services/{id}/check", post(handlers::trigger_check))
        .route_layer(from_fn_with_state(auth, auth::require_admin));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", public.merge(admin).with_state(state))
}
