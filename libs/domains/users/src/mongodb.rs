//! MongoDB implementation of UserRepository

use async_trait::async_trait;
use axum_helpers::errors::is_duplicate_key;
use futures_util::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc, oid::ObjectId, to_document},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
};
use tracing::instrument;

use crate::error::{UserError, UserResult};
use crate::models::{USERS_COLLECTION, User, UserChanges};
use crate::repository::UserRepository;

/// MongoDB implementation of the UserRepository
pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    /// ```ignore
    /// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
    /// let repo = MongoUserRepository::new(client.database("users"));
    /// repo.create_indexes().await?;
    /// ```
    pub fn new(db: Database) -> Self {
        Self::with_collection(db, USERS_COLLECTION)
    }

    pub fn with_collection(db: Database, collection_name: &str) -> Self {
        let collection = db.collection::<User>(collection_name);
        Self { collection }
    }

    /// Get the underlying collection for advanced operations
    pub fn collection(&self) -> &Collection<User> {
        &self.collection
    }

    /// Unique index on `email`. Idempotent.
    #[instrument(skip(self))]
    pub async fn create_indexes(&self) -> UserResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(index).await?;
        tracing::info!(collection = %self.collection.name(), "User indexes ensured");
        Ok(())
    }

    fn by_id(id: ObjectId) -> Document {
        doc! { "_id": id }
    }

    fn list_options(skip: u64, limit: u64) -> FindOptions {
        FindOptions::builder()
            .sort(doc! { "createdAt": 1, "_id": 1 })
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build()
    }

    fn map_write_error(err: mongodb::error::Error, email: Option<&str>) -> UserError {
        match email {
            Some(email) if is_duplicate_key(&err) => UserError::DuplicateEmail(email.to_string()),
            _ => UserError::from(err),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create(&self, user: User) -> UserResult<User> {
        self.collection
            .insert_one(&user)
            .await
            .map_err(|e| Self::map_write_error(e, Some(&user.email)))?;

        tracing::info!(user_id = %user.id, "User created successfully");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: ObjectId) -> UserResult<Option<User>> {
        let user = self.collection.find_one(Self::by_id(id)).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list(&self, skip: u64, limit: u64) -> UserResult<Vec<User>> {
        let cursor = self
            .collection
            .find(doc! {})
            .with_options(Self::list_options(skip, limit))
            .await?;
        let users: Vec<User> = cursor.try_collect().await?;

        Ok(users)
    }

    #[instrument(skip(self, changes))]
    async fn find_one_and_update(
        &self,
        id: ObjectId,
        changes: UserChanges,
    ) -> UserResult<Option<User>> {
        let set = to_document(&changes)?;

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let user = self
            .collection
            .find_one_and_update(Self::by_id(id), doc! { "$set": set })
            .with_options(options)
            .await
            .map_err(|e| Self::map_write_error(e, changes.email.as_deref()))?;

        Ok(user)
    }
}
