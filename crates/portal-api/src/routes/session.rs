use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use portal_auth::{RawClaims, VerifiedIdentity};
use portal_types::{InspectRequest, Role};
use serde::Serialize;

use crate::middleware::auth::{error_response, require_api_auth, require_role, AppState, RoleGate};

#[derive(Serialize)]
struct InspectResponse {
    /// Always false: inspection never checks signature or expiry.
    verified: bool,
    expired: bool,
    claims: RawClaims,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let inspect = Router::new()
        .route("/api/v1/session/inspect", post(post_inspect))
        .route_layer(middleware::from_fn_with_state(
            RoleGate(&[Role::Admin]),
            require_role,
        ));

    Router::new()
        .route("/api/v1/session", get(get_session))
        .merge(inspect)
        .route_layer(middleware::from_fn_with_state(state, require_api_auth))
}

async fn get_session(Extension(identity): Extension<VerifiedIdentity>) -> Json<VerifiedIdentity> {
    Json(identity)
}

/// Diagnostic view of an arbitrary token. The result carries no authority.
async fn post_inspect(
    State(state): State<AppState>,
    Json(body): Json<InspectRequest>,
) -> Response {
    match state.tokens.inspect(&body.token) {
        Ok(claims) => Json(InspectResponse {
            verified: false,
            expired: claims.is_expired_at(chrono::Utc::now()),
            claims,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    }
}
