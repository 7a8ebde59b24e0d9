//! API routes module
//!
//! Routes are nested under `/api` by `axum_helpers::create_router`.

pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

pub fn routes(state: &AppState) -> Router {
    Router::new()
        .nest("/v1/users", users::router(state))
        .merge(health::router(state.clone()))
}
