//! Custom extractors for Axum handlers.
//!
//! Both reject with [`AppError`](crate::errors::AppError) so failures render
//! the shared JSON error envelope.

pub mod object_id_path;
pub mod validated_json;

pub use object_id_path::ObjectIdPath;
pub use validated_json::ValidatedJson;
