use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Collection that stores [`User`] documents
pub const USERS_COLLECTION: &str = "users";

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 5;

/// User role
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Writer,
    Editor,
    #[default]
    User,
}

/// Operation a role is permitted to perform
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Role {
    /// Fixed action list granted by this role, in canonical order
    pub fn actions(self) -> Vec<Action> {
        let granted: &[Action] = match self {
            Role::User => &[Action::Read],
            Role::Writer => &[Action::Read, Action::Create],
            Role::Editor => &[Action::Read, Action::Create, Action::Update],
            Role::Admin => &[Action::Read, Action::Create, Action::Update, Action::Delete],
        };
        granted.to_vec()
    }
}

/// User document as stored in MongoDB
///
/// `password` holds an Argon2 PHC string and never leaves the service;
/// API responses use [`UserResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_img: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Normalised fields for a new user; the password is already hashed
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub slug: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub profile_img: Option<String>,
    pub role: Role,
}

impl User {
    pub fn new(input: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            name: input.name,
            slug: input.slug,
            email: input.email,
            password: input.password_hash,
            phone: input.phone,
            profile_img: input.profile_img,
            role: input.role,
            actions: input.role.actions(),
            active: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a change set the same way a `$set` would
    pub fn apply(&mut self, changes: UserChanges) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(slug) = changes.slug {
            self.slug = slug;
        }
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(phone) = changes.phone {
            self.phone = Some(phone);
        }
        if let Some(profile_img) = changes.profile_img {
            self.profile_img = Some(profile_img);
        }
        if let Some(role) = changes.role {
            self.role = role;
        }
        if let Some(actions) = changes.actions {
            self.actions = actions;
        }
        if let Some(active) = changes.active {
            self.active = active;
        }
        if let Some(password) = changes.password {
            self.password = password;
        }
        self.updated_at = changes.updated_at;
    }
}

/// Partial update serialised directly into a MongoDB `$set` document
///
/// `None` fields are omitted, so they keep their stored value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_img: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Default for UserChanges {
    fn default() -> Self {
        Self {
            name: None,
            slug: None,
            email: None,
            phone: None,
            profile_img: None,
            role: None,
            actions: None,
            active: None,
            password: None,
            updated_at: Utc::now(),
        }
    }
}

/// User as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// 24-character hex ObjectId
    pub id: String,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile_img: Option<String>,
    pub role: Role,
    pub actions: Vec<Action>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name,
            slug: user.slug,
            email: user.email,
            phone: user.phone,
            profile_img: user.profile_img,
            role: user.role,
            actions: user.actions,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Emails are trimmed before `validator` sees them
fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

fn trimmed_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|s| s.map(|s| s.trim().to_string()))
}

/// DTO for creating a user
///
/// Missing string fields deserialize as empty and fail validation.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub profile_img: Option<String>,
}

/// DTO for updating a user; absent fields are left unchanged
///
/// `null` counts as absent, so `phone` and `profileImg` cannot be cleared
/// once set.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub profile_img: Option<String>,
}

/// DTO for replacing a user's password
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    #[serde(default)]
    #[validate(length(min = 8, max = 128))]
    pub new_pwd: String,
}

/// Pagination for listing users
///
/// Values are parsed leniently: missing, non-numeric or non-positive
/// input falls back to the defaults (page 1, limit 5).
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Page number, starting at 1
    #[param(value_type = Option<u64>, example = 1)]
    #[schema(value_type = Option<u64>)]
    pub page: Option<String>,
    /// Page size
    #[param(value_type = Option<u64>, example = 5)]
    #[schema(value_type = Option<u64>)]
    pub limit: Option<String>,
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

impl ListQuery {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: Some(page.to_string()),
            limit: Some(limit.to_string()),
        }
    }

    pub fn page(&self) -> u64 {
        positive_or(self.page.as_deref(), DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u64 {
        positive_or(self.limit.as_deref(), DEFAULT_LIMIT)
    }

    /// Documents to skip: `(page - 1) * limit`
    pub fn skip(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}
