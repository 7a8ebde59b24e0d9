//! Users Domain
//!
//! User accounts stored in MongoDB: list, get, create, update, soft delete
//! and password changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, response envelopes
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← One repository call per operation
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Schema    │  ← Save pipeline: normalise, slug, actions, password hash
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + MongoDB + in-memory)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs, roles
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{handlers, mongodb::MongoUserRepository, service::UserService};
//! use mongodb::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//!
//! let repository = MongoUserRepository::new(client.database("users"));
//! repository.create_indexes().await?;
//!
//! let router = handlers::router(UserService::new(repository));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod mongodb;
pub mod password;
pub mod repository;
pub mod schema;
pub mod service;

// Re-export commonly used types
pub use error::{UserError, UserResult};
pub use handlers::ApiDoc;
pub use models::{
    Action, ChangePassword, CreateUser, ListQuery, Role, UpdateUser, User, UserChanges,
    UserResponse,
};
pub use mongodb::MongoUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::{UserPage, UserService};
