use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{UserError, UserResult};
use crate::models::{User, UserChanges};

/// Repository trait for User persistence
///
/// Each method is a single round trip to the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a fully prepared user; fails with `DuplicateEmail` on a taken email
    async fn create(&self, user: User) -> UserResult<User>;

    async fn get_by_id(&self, id: ObjectId) -> UserResult<Option<User>>;

    /// Users ordered by creation time, oldest first
    async fn list(&self, skip: u64, limit: u64) -> UserResult<Vec<User>>;

    /// Atomically `$set` the changes and return the updated document,
    /// or `None` when no user has this id
    async fn find_one_and_update(
        &self,
        id: ObjectId,
        changes: UserChanges,
    ) -> UserResult<Option<User>>;
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<ObjectId, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> UserResult<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(UserError::DuplicateEmail(user.email));
        }

        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: ObjectId) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn list(&self, skip: u64, limit: u64) -> UserResult<Vec<User>> {
        let users = self.users.read().await;

        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(all
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn find_one_and_update(
        &self,
        id: ObjectId,
        changes: UserChanges,
    ) -> UserResult<Option<User>> {
        let mut users = self.users.write().await;

        if !users.contains_key(&id) {
            return Ok(None);
        }

        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(UserError::DuplicateEmail(email.clone()));
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        user.apply(changes);
        Ok(Some(user.clone()))
    }
}
