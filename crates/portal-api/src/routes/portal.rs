use axum::{middleware, routing::get, Extension, Json, Router};
use portal_auth::VerifiedIdentity;
use portal_types::Role;
use serde::Serialize;

use crate::middleware::auth::{require_api_auth, require_role, AppState, RoleGate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PortalHome {
    portal: Role,
    user_id: i64,
    display_name: Option<String>,
    session_expires_at: i64,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(gated("/api/v1/portal/student", Role::Student, &[Role::Student]))
        .merge(gated("/api/v1/portal/teacher", Role::Teacher, &[Role::Teacher]))
        .merge(gated("/api/v1/portal/admin", Role::Admin, &[Role::Admin]))
        .route_layer(middleware::from_fn_with_state(state, require_api_auth))
}

fn gated(path: &str, portal: Role, allowed: &'static [Role]) -> Router<AppState> {
    Router::new()
        .route(
            path,
            get(move |Extension(identity): Extension<VerifiedIdentity>| async move {
                portal_home(portal, &identity)
            }),
        )
        .route_layer(middleware::from_fn_with_state(RoleGate(allowed), require_role))
}

fn portal_home(portal: Role, identity: &VerifiedIdentity) -> Json<PortalHome> {
    Json(PortalHome {
        portal,
        user_id: identity.user_id(),
        display_name: identity
            .claim("name")
            .and_then(|v| v.as_str())
            .map(String::from),
        session_expires_at: identity.expires_at(),
    })
}
