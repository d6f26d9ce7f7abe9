pub mod portal;
pub mod session;

use axum::Router;

use crate::middleware::auth::AppState;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(session::routes(state.clone()))
        .merge(portal::routes(state))
}
