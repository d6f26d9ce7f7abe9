use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use portal_auth::{AccountDirectory, TokenService, VerifiedIdentity};
use portal_types::{ErrorResponse, LoginRequest, LoginResponse, Role, SESSION_TTL_SECS};
use tracing::{debug, error, info};

const LOGGED_USERNAME_MAX: usize = 64;

pub const SESSION_COOKIE: &str = "session_token";

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<dyn AccountDirectory>,
    /// Adds `Secure` to the session cookie. Off only for plain-http dev.
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(tokens: TokenService, accounts: impl AccountDirectory + 'static) -> Self {
        Self {
            tokens: Arc::new(tokens),
            accounts: Arc::new(accounts),
            secure_cookies: true,
        }
    }
}

/// Roles allowed through `require_role`.
#[derive(Clone, Copy, Debug)]
pub struct RoleGate(pub &'static [Role]);

pub fn auth_routes(_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/login", post(handle_login))
        .route("/api/v1/auth/logout", post(handle_logout))
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

async fn handle_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let Some(identity) = state.accounts.authenticate(&body.username, &body.password) else {
        debug!(username = %loggable_username(&body.username), "login rejected");
        return error_response(StatusCode::UNAUTHORIZED, "invalid credentials");
    };

    let issuedAt = Utc::now();
    let token = match state.tokens.issue_at(&identity, issuedAt) {
        Ok(token) => token,
        Err(e) => {
            error!(user_id = identity.user_id, "failed to issue session token: {e}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not start session");
        }
    };

    info!(user_id = identity.user_id, role = %identity.role, "login succeeded");

    let cookieValue = session_cookie(&token, SESSION_TTL_SECS, state.secure_cookies);
    let loginResponse = LoginResponse {
        token,
        user_id: identity.user_id,
        role: identity.role,
        expires_at: issuedAt.timestamp() + SESSION_TTL_SECS,
    };

    with_cookie(Json(loginResponse).into_response(), &cookieValue)
}

/// Clears the session cookie. Tokens are not revoked server-side; a copy
/// of the token stays valid until it expires.
async fn handle_logout(State(state): State<AppState>) -> Response {
    let cookieValue = session_cookie("", 0, state.secure_cookies);
    with_cookie(
        Json(serde_json::json!({ "ok": true })).into_response(),
        &cookieValue,
    )
}

fn loggable_username(username: &str) -> String {
    username
        .chars()
        .take(LOGGED_USERNAME_MAX)
        .map(|c| if c.is_control() { '?' } else { c })
        .collect()
}

fn session_cookie(value: &str, maxAge: i64, secure: bool) -> String {
    let secureAttr = if secure { " Secure;" } else { "" };
    format!("{SESSION_COOKIE}={value}; HttpOnly;{secureAttr} SameSite=Strict; Path=/; Max-Age={maxAge}")
}

fn with_cookie(mut response: Response, cookieValue: &str) -> Response {
    match HeaderValue::from_str(cookieValue) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
            response
        }
        Err(e) => {
            error!("invalid session cookie header: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Token from `Authorization: Bearer <token>`, falling back to the
/// session cookie for browser requests.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let authHeader = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Some(h) = authHeader {
        if let Some(token) = h.strip_prefix("Bearer ") {
            let token = token.trim();
            return (!token.is_empty()).then(|| token.to_string());
        }
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Middleware for API routes: verifies the session token and stores the
/// resulting `VerifiedIdentity` in request extensions.
pub async fn require_api_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers()) else {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    };

    match state.tokens.check(&token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            debug!(
                reason = e.kind(),
                path = %request.uri().path(),
                "rejected session token"
            );
            error_response(StatusCode::UNAUTHORIZED, "unauthorized")
        }
    }
}

/// Must run after `require_api_auth`.
pub async fn require_role(
    State(gate): State<RoleGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(identity) = request.extensions().get::<VerifiedIdentity>() else {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    };

    if !identity.has_any_role(gate.0) {
        debug!(
            user_id = identity.user_id(),
            role = %identity.role(),
            path = %request.uri().path(),
            "role not allowed"
        );
        return error_response(StatusCode::FORBIDDEN, "forbidden");
    }

    next.run(request).await
}
