use chrono::{DateTime, Utc};
use sqlx::FromRow;

// --- Stored Rows ---

/// User
///
/// A row of the `users` table. `password` holds the argon2 PHC string, never plaintext,
/// and is never handed to the serialization layer.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    // Inactive accounts can neither log in nor authenticate with an existing token.
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Bookmark
///
/// A row of the `bookmarks` table joined with its owner, so `owner_username` is always
/// loaded alongside `owner_id`.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct Bookmark {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner_id: i64,
    pub owner_username: String,
}

// --- Validated Write Sets ---

/// The writable columns of a bookmark after validation. The owner is never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkFields {
    pub name: String,
    pub url: String,
}

/// The writable columns of a user after validation and hashing.
#[derive(Debug, Clone)]
pub struct UserFields {
    pub username: String,
    pub password_hash: String,
}

/// NewUser
///
/// Insert payload for the `users` table. Self-registration always produces a plain
/// account; only provisioning sets the privilege flags.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    pub fn regular(fields: UserFields) -> Self {
        Self {
            username: fields.username,
            password_hash: fields.password_hash,
            email: String::new(),
            is_staff: false,
            is_superuser: false,
        }
    }
}
