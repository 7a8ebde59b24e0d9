//! Users API routes backed by MongoDB

use axum::Router;
use domain_users::{MongoUserRepository, UserResult, UserService, handlers};
use mongodb::Database;

use crate::state::AppState;

pub fn router(state: &AppState) -> Router {
    let repository = MongoUserRepository::new(state.db.clone());
    handlers::router(UserService::new(repository))
}

/// Ensure the `users` collection indexes exist
pub async fn init_indexes(db: &Database) -> UserResult<()> {
    MongoUserRepository::new(db.clone()).create_indexes().await
}
