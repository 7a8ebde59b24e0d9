//! User Service - Business logic layer

use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use tracing::instrument;

use crate::error::{UserError, UserResult};
use crate::models::{
    ChangePassword, CreateUser, ListQuery, UpdateUser, User, UserChanges, UserResponse,
};
use crate::repository::UserRepository;
use crate::schema;

/// One page of users
#[derive(Debug, Clone, PartialEq)]
pub struct UserPage {
    pub page: u64,
    pub users: Vec<UserResponse>,
}

/// User service providing business logic operations
///
/// Each operation runs the save pipeline in [`schema`] and then makes a
/// single repository call.
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// List users page by page; an out-of-range page is empty, not an error
    #[instrument(skip(self))]
    pub async fn list_users(&self, query: ListQuery) -> UserResult<UserPage> {
        let users = self
            .repository
            .list(query.skip(), query.limit())
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect();

        Ok(UserPage {
            page: query.page(),
            users,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: ObjectId) -> UserResult<UserResponse> {
        self.repository
            .get_by_id(id)
            .await?
            .map(UserResponse::from)
            .ok_or(UserError::NotFound(id))
    }

    /// Create a user
    ///
    /// Storage failures other than a taken email surface as `CreateFailed`.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUser) -> UserResult<UserResponse> {
        let user = schema::prepare_new(input)?;

        let created = self.repository.create(user).await.map_err(|e| match e {
            UserError::DuplicateEmail(_) | UserError::Validation(_) => e,
            other => UserError::CreateFailed(other.to_string()),
        })?;

        tracing::info!(user_id = %created.id, "User created");
        Ok(created.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(&self, id: ObjectId, input: UpdateUser) -> UserResult<UserResponse> {
        let changes = schema::prepare_changes(input)?;
        let user = self.apply(id, changes).await?;

        tracing::info!(user_id = %id, "User updated");
        Ok(user.into())
    }

    /// Soft delete: the record stays, with `active = false`
    #[instrument(skip(self))]
    pub async fn deactivate_user(&self, id: ObjectId) -> UserResult<UserResponse> {
        let user = self.apply(id, schema::prepare_deactivation()).await?;

        tracing::info!(user_id = %id, "User deactivated");
        Ok(user.into())
    }

    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        id: ObjectId,
        input: ChangePassword,
    ) -> UserResult<UserResponse> {
        let changes = schema::prepare_password_change(&input.new_pwd)?;
        let user = self.apply(id, changes).await?;

        tracing::info!(user_id = %id, "User password changed");
        Ok(user.into())
    }

    async fn apply(&self, id: ObjectId, changes: UserChanges) -> UserResult<User> {
        self.repository
            .find_one_and_update(id, changes)
            .await?
            .ok_or(UserError::NotFound(id))
    }
}

impl<R: UserRepository> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}
