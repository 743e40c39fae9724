//! Bearer-token guard for mutating routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::handlers::error_response;

/// The configured admin token. Without one, every admin request is refused.
#[derive(Clone, Default)]
pub struct AdminAuth {
    token: Option<Arc<str>>,
}

impl AdminAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .map(Arc::from),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.bytes().zip(b.bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

/// Middleware: require `Authorization: Bearer <admin_token>`.
pub async fn require_admin(
    State(auth): State<AdminAuth>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth.token.as_deref() else {
        warn!(path = %request.uri().path(), "admin request refused: no admin token configured");
        return error_response("admin api disabled", StatusCode::UNAUTHORIZED).into_response();
    };

    match bearer(&headers) {
        Some(token) if constant_time_eq(token, expected) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "invalid admin token");
            error_response("invalid admin token", StatusCode::UNAUTHORIZED).into_response()
        }
        None => {
            debug!(path = %request.uri().path(), "no bearer token provided");
            error_response("missing bearer token", StatusCode::UNAUTHORIZED).into_response()
        }
    }
}
