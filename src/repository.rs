use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    error::RepositoryError,
    models::{Bookmark, BookmarkFields, NewUser, User, UserFields},
    policy::Scope,
};

const DUPLICATE_USERNAME: &str = "username: A user with that username already exists.";
const UNKNOWN_OWNER: &str = "owner: The owning user does not exist.";

/// Repository Trait
///
/// The persistence contract. Every single-row operation takes the caller's `Scope` and
/// applies it inside the query, so a row outside the visible set is simply not found.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Bookmarks ---
    /// Bookmarks inside `scope`, ordered by owner id then id.
    async fn list_bookmarks(&self, scope: Scope) -> Result<Vec<Bookmark>, RepositoryError>;
    async fn find_bookmark(&self, id: i64, scope: Scope)
    -> Result<Option<Bookmark>, RepositoryError>;
    async fn create_bookmark(
        &self,
        owner_id: i64,
        fields: BookmarkFields,
    ) -> Result<Bookmark, RepositoryError>;
    async fn update_bookmark(
        &self,
        id: i64,
        scope: Scope,
        fields: BookmarkFields,
    ) -> Result<Option<Bookmark>, RepositoryError>;
    /// Returns true only if a row inside `scope` was removed.
    async fn delete_bookmark(&self, id: i64, scope: Scope) -> Result<bool, RepositoryError>;

    // --- Users ---
    /// Users inside `scope`, ordered by id.
    async fn list_users(&self, scope: Scope) -> Result<Vec<User>, RepositoryError>;
    async fn find_user(&self, id: i64, scope: Scope) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<User>, RepositoryError>;
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn update_user(
        &self,
        id: i64,
        scope: Scope,
        fields: UserFields,
    ) -> Result<Option<User>, RepositoryError>;
    /// Removes the user and, through the foreign key, the bookmarks it owns.
    async fn delete_user(&self, id: i64, scope: Scope) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Maps constraint violations to client-facing conflicts; everything else stays a
/// database error.
fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(DUPLICATE_USERNAME.to_string());
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::Conflict(UNKNOWN_OWNER.to_string());
        }
    }
    RepositoryError::Database(err)
}

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Queries are checked at runtime (`query_as` with
/// `FromRow`) so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, username, password, email, is_staff, is_superuser, is_active, date_joined";

#[async_trait]
impl Repository for PostgresRepository {
    /// list_bookmarks
    ///
    /// `$1` is the owner filter; NULL means every row is visible.
    async fn list_bookmarks(&self, scope: Scope) -> Result<Vec<Bookmark>, RepositoryError> {
        sqlx::query_as::<_, Bookmark>(
            r#"
            SELECT b.id, b.name, b.url, b.owner_id, u.username AS owner_username
            FROM bookmarks b
            JOIN users u ON u.id = b.owner_id
            WHERE ($1::BIGINT IS NULL OR b.owner_id = $1)
            ORDER BY b.owner_id ASC, b.id ASC
            "#,
        )
        .bind(scope.owner())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    async fn find_bookmark(
        &self,
        id: i64,
        scope: Scope,
    ) -> Result<Option<Bookmark>, RepositoryError> {
        sqlx::query_as::<_, Bookmark>(
            r#"
            SELECT b.id, b.name, b.url, b.owner_id, u.username AS owner_username
            FROM bookmarks b
            JOIN users u ON u.id = b.owner_id
            WHERE b.id = $1 AND ($2::BIGINT IS NULL OR b.owner_id = $2)
            "#,
        )
        .bind(id)
        .bind(scope.owner())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    /// create_bookmark
    ///
    /// Inserts and joins the owner in one statement (CTE) to return the enriched row.
    async fn create_bookmark(
        &self,
        owner_id: i64,
        fields: BookmarkFields,
    ) -> Result<Bookmark, RepositoryError> {
        sqlx::query_as::<_, Bookmark>(
            r#"
            WITH inserted AS (
                INSERT INTO bookmarks (name, url, owner_id) VALUES ($1, $2, $3)
                RETURNING id, name, url, owner_id
            )
            SELECT i.id, i.name, i.url, i.owner_id, u.username AS owner_username
            FROM inserted i JOIN users u ON u.id = i.owner_id
            "#,
        )
        .bind(fields.name)
        .bind(fields.url)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn update_bookmark(
        &self,
        id: i64,
        scope: Scope,
        fields: BookmarkFields,
    ) -> Result<Option<Bookmark>, RepositoryError> {
        sqlx::query_as::<_, Bookmark>(
            r#"
            WITH updated AS (
                UPDATE bookmarks SET name = $3, url = $4
                WHERE id = $1 AND ($2::BIGINT IS NULL OR owner_id = $2)
                RETURNING id, name, url, owner_id
            )
            SELECT d.id, d.name, d.url, d.owner_id, u.username AS owner_username
            FROM updated d JOIN users u ON u.id = d.owner_id
            "#,
        )
        .bind(id)
        .bind(scope.owner())
        .bind(fields.name)
        .bind(fields.url)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn delete_bookmark(&self, id: i64, scope: Scope) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM bookmarks WHERE id = $1 AND ($2::BIGINT IS NULL OR owner_id = $2)",
        )
        .bind(id)
        .bind(scope.owner())
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, scope: Scope) -> Result<Vec<User>, RepositoryError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE ($1::BIGINT IS NULL OR id = $1) ORDER BY id ASC"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(scope.owner())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_user(&self, id: i64, scope: Scope) -> Result<Option<User>, RepositoryError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND ($2::BIGINT IS NULL OR id = $2)"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(scope.owner())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let query = format!(
            "INSERT INTO users (username, password, email, is_staff, is_superuser) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.username)
            .bind(user.password_hash)
            .bind(user.email)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn update_user(
        &self,
        id: i64,
        scope: Scope,
        fields: UserFields,
    ) -> Result<Option<User>, RepositoryError> {
        let query = format!(
            "UPDATE users SET username = $3, password = $4 \
             WHERE id = $1 AND ($2::BIGINT IS NULL OR id = $2) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(scope.owner())
            .bind(fields.username)
            .bind(fields.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn delete_user(&self, id: i64, scope: Scope) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM users WHERE id = $1 AND ($2::BIGINT IS NULL OR id = $2)")
                .bind(id)
                .bind(scope.owner())
                .execute(&self.pool)
                .await
                .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory Implementation ---

#[derive(Clone)]
struct BookmarkRow {
    id: i64,
    name: String,
    url: String,
    owner_id: i64,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    bookmarks: Vec<BookmarkRow>,
    next_user_id: i64,
    next_bookmark_id: i64,
}

impl Tables {
    fn joined(&self, row: &BookmarkRow) -> Bookmark {
        let owner_username = self
            .users
            .iter()
            .find(|u| u.id == row.owner_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();

        Bookmark {
            id: row.id,
            name: row.name.clone(),
            url: row.url.clone(),
            owner_id: row.owner_id,
            owner_username,
        }
    }

    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .iter()
            .any(|u| u.username == username && Some(u.id) != except)
    }
}

/// MemoryRepository
///
/// A process-local `Repository` with the same scoping, ordering, uniqueness and cascade
/// semantics as the Postgres schema. Ids are assigned sequentially from 1, like `BIGSERIAL`.
/// Used by the test suites and for running the API without a database.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_bookmarks(&self, scope: Scope) -> Result<Vec<Bookmark>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<&BookmarkRow> = tables
            .bookmarks
            .iter()
            .filter(|b| scope.admits(b.owner_id))
            .collect();
        rows.sort_by_key(|b| (b.owner_id, b.id));

        Ok(rows.into_iter().map(|b| tables.joined(b)).collect())
    }

    async fn find_bookmark(
        &self,
        id: i64,
        scope: Scope,
    ) -> Result<Option<Bookmark>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookmarks
            .iter()
            .find(|b| b.id == id && scope.admits(b.owner_id))
            .map(|b| tables.joined(b)))
    }

    async fn create_bookmark(
        &self,
        owner_id: i64,
        fields: BookmarkFields,
    ) -> Result<Bookmark, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.iter().any(|u| u.id == owner_id) {
            return Err(RepositoryError::Conflict(UNKNOWN_OWNER.to_string()));
        }

        tables.next_bookmark_id += 1;
        let row = BookmarkRow {
            id: tables.next_bookmark_id,
            name: fields.name,
            url: fields.url,
            owner_id,
        };
        let bookmark = tables.joined(&row);
        tables.bookmarks.push(row);
        Ok(bookmark)
    }

    async fn update_bookmark(
        &self,
        id: i64,
        scope: Scope,
        fields: BookmarkFields,
    ) -> Result<Option<Bookmark>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(row) = tables
            .bookmarks
            .iter_mut()
            .find(|b| b.id == id && scope.admits(b.owner_id))
        else {
            return Ok(None);
        };

        row.name = fields.name;
        row.url = fields.url;
        let row = row.clone();
        Ok(Some(tables.joined(&row)))
    }

    async fn delete_bookmark(&self, id: i64, scope: Scope) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.bookmarks.len();
        tables
            .bookmarks
            .retain(|b| !(b.id == id && scope.admits(b.owner_id)));
        Ok(tables.bookmarks.len() < before)
    }

    async fn list_users(&self, scope: Scope) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables
            .users
            .iter()
            .filter(|u| scope.admits(u.id))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn find_user(&self, id: i64, scope: Scope) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id && scope.admits(u.id))
            .cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.username_taken(&user.username, None) {
            return Err(RepositoryError::Conflict(DUPLICATE_USERNAME.to_string()));
        }

        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            password: user.password_hash,
            email: user.email,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_active: true,
            date_joined: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(
        &self,
        id: i64,
        scope: Scope,
        fields: UserFields,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.iter().any(|u| u.id == id && scope.admits(u.id)) {
            return Ok(None);
        }
        if tables.username_taken(&fields.username, Some(id)) {
            return Err(RepositoryError::Conflict(DUPLICATE_USERNAME.to_string()));
        }

        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.username = fields.username;
        user.password = fields.password_hash;
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64, scope: Scope) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.users.len();
        tables.users.retain(|u| !(u.id == id && scope.admits(u.id)));

        let removed = tables.users.len() < before;
        if removed {
            tables.bookmarks.retain(|b| b.owner_id != id);
        }
        Ok(removed)
    }
}
