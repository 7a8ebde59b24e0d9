//! Save pipeline for user records
//!
//! Every write goes through one of these functions before it reaches a
//! repository. They normalise input, derive `slug` and `actions`, and hash
//! passwords. A plaintext password is hashed exactly once, and only when one
//! is being assigned.

use chrono::Utc;
use deunicode::deunicode;

use crate::error::{UserError, UserResult};
use crate::models::{CreateUser, NewUser, UpdateUser, User, UserChanges};
use crate::password::hash_password;

/// Lowercase, URL-safe form of a display name
///
/// Non-ASCII letters are transliterated first, then runs of characters
/// outside `[a-z0-9]` collapse into one `-`, with no leading or trailing `-`.
///
/// ```
/// use domain_users::schema::slugify;
///
/// assert_eq!(slugify("John  Doe!"), "john-doe");
/// assert_eq!(slugify("Иван Петров"), "ivan-petrov");
/// ```
pub fn slugify(name: &str) -> String {
    let ascii = deunicode(name);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn required(field: &str, value: &str) -> UserResult<()> {
    if value.trim().is_empty() {
        return Err(UserError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Validate and normalise a create request, then hash its password
///
/// Blank fields are rejected before any hashing runs.
pub fn prepare_new(input: CreateUser) -> UserResult<User> {
    required("name", &input.name)?;
    required("email", &input.email)?;
    required("password", &input.password)?;

    let name = input.name.trim().to_string();
    let password_hash = hash_password(&input.password)?;

    Ok(User::new(NewUser {
        slug: slugify(&name),
        name,
        email: normalize_email(&input.email),
        password_hash,
        phone: input.phone,
        profile_img: input.profile_img,
        role: input.role.unwrap_or_default(),
    }))
}

/// Change set for an update request
///
/// A new `name` also rewrites `slug`; a new `role` also rewrites `actions`.
/// The stored password is never part of it.
pub fn prepare_changes(input: UpdateUser) -> UserResult<UserChanges> {
    let mut changes = UserChanges::default();

    if let Some(name) = input.name {
        required("name", &name)?;
        let name = name.trim().to_string();
        changes.slug = Some(slugify(&name));
        changes.name = Some(name);
    }

    if let Some(email) = input.email {
        required("email", &email)?;
        changes.email = Some(normalize_email(&email));
    }

    if let Some(role) = input.role {
        changes.role = Some(role);
        changes.actions = Some(role.actions());
    }

    changes.phone = input.phone;
    changes.profile_img = input.profile_img;
    changes.updated_at = Utc::now();

    Ok(changes)
}

/// Change set that stores the hash of `new_password`
pub fn prepare_password_change(new_password: &str) -> UserResult<UserChanges> {
    required("newPwd", new_password)?;

    Ok(UserChanges {
        password: Some(hash_password(new_password)?),
        ..Default::default()
    })
}

/// Change set for a soft delete
pub fn prepare_deactivation() -> UserChanges {
    UserChanges {
        active: Some(false),
        ..Default::default()
    }
}
