mod common;

use bookmark_api::{
    MemoryRepository, PostgresRepository,
    error::RepositoryError,
    models::{BookmarkFields, UserFields},
    policy::Scope,
    repository::Repository,
};
use common::{ADMIN_ID, USER1_ID, USER2_ID, new_user, seed};
use sqlx::PgPool;

// --- Test Context and Setup ---

/// Holds a migrated pool whose tables were emptied and whose id sequences restart at 1.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        sqlx::query("TRUNCATE bookmarks, users RESTART IDENTITY CASCADE")
            .execute(&pool)
            .await
            .expect("Failed to reset tables.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

fn fields(name: &str, url: &str) -> BookmarkFields {
    BookmarkFields {
        name: name.into(),
        url: url.into(),
    }
}

// --- Shared Contract ---
// Both implementations must agree on scoping, ordering, uniqueness and cascade.

async fn assert_bookmark_scoping(repo: &dyn Repository) {
    seed(repo).await;

    let all = repo.list_bookmarks(Scope::Unrestricted).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].owner_username, "user1");
    assert_eq!(all[1].owner_username, "user2");

    let mine = repo.list_bookmarks(Scope::OwnedBy(USER1_ID)).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].name, "Bookmark 1");

    assert!(repo.find_bookmark(2, Scope::OwnedBy(USER1_ID)).await.unwrap().is_none());
    assert!(repo.find_bookmark(2, Scope::OwnedBy(USER2_ID)).await.unwrap().is_some());

    let updated = repo
        .update_bookmark(2, Scope::OwnedBy(USER1_ID), fields("Hijack", "http://evil.example"))
        .await
        .unwrap();
    assert!(updated.is_none());

    assert!(!repo.delete_bookmark(2, Scope::OwnedBy(USER1_ID)).await.unwrap());
    assert!(repo.delete_bookmark(2, Scope::OwnedBy(USER2_ID)).await.unwrap());
    assert!(!repo.delete_bookmark(2, Scope::OwnedBy(USER2_ID)).await.unwrap());
}

async fn assert_listing_order(repo: &dyn Repository) {
    seed(repo).await;

    repo.create_bookmark(USER2_ID, fields("Third", "http://three.example"))
        .await
        .unwrap();
    repo.create_bookmark(USER1_ID, fields("Fourth", "http://four.example"))
        .await
        .unwrap();

    let order: Vec<(i64, i64)> = repo
        .list_bookmarks(Scope::Unrestricted)
        .await
        .unwrap()
        .into_iter()
        .map(|b| (b.owner_id, b.id))
        .collect();
    assert_eq!(order, vec![(2, 1), (2, 4), (3, 2), (3, 3)]);

    let ids: Vec<i64> = repo
        .list_users(Scope::Unrestricted)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(ids, vec![ADMIN_ID, USER1_ID, USER2_ID]);
}

async fn assert_username_uniqueness(repo: &dyn Repository) {
    seed(repo).await;

    let err = repo.create_user(new_user("user1", false)).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(ref m) if m.starts_with("username:")));

    let err = repo
        .update_user(
            USER1_ID,
            Scope::OwnedBy(USER1_ID),
            UserFields {
                username: "user2".into(),
                password_hash: "irrelevant".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    // Keeping one's own username is not a conflict.
    let kept = repo
        .update_user(
            USER1_ID,
            Scope::OwnedBy(USER1_ID),
            UserFields {
                username: "user1".into(),
                password_hash: "new-hash".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.password, "new-hash");
}

async fn assert_user_delete_cascades(repo: &dyn Repository) {
    seed(repo).await;

    assert!(!repo.delete_user(USER2_ID, Scope::OwnedBy(USER1_ID)).await.unwrap());
    assert!(repo.delete_user(USER2_ID, Scope::OwnedBy(USER2_ID)).await.unwrap());

    let remaining = repo.list_bookmarks(Scope::Unrestricted).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].owner_id, USER1_ID);
    assert!(repo.find_user(USER2_ID, Scope::Unrestricted).await.unwrap().is_none());
}

async fn assert_rename_follows_bookmarks(repo: &dyn Repository) {
    seed(repo).await;

    repo.update_user(
        USER1_ID,
        Scope::OwnedBy(USER1_ID),
        UserFields {
            username: "renamed".into(),
            password_hash: "hash".into(),
        },
    )
    .await
    .unwrap();

    let bookmark = repo
        .find_bookmark(1, Scope::OwnedBy(USER1_ID))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bookmark.owner_username, "renamed");
}

// --- In-Memory ---

#[tokio::test]
async fn test_memory_bookmark_scoping() {
    assert_bookmark_scoping(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_listing_order() {
    assert_listing_order(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_username_uniqueness() {
    assert_username_uniqueness(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_user_delete_cascades() {
    assert_user_delete_cascades(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_rename_follows_bookmarks() {
    assert_rename_follows_bookmarks(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_rejects_bookmarks_for_unknown_owner() {
    let repo = MemoryRepository::new();

    let err = repo
        .create_bookmark(42, fields("Orphan", "http://orphan.example"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "owner: The owning user does not exist.");
}

#[tokio::test]
async fn test_memory_new_users_are_active() {
    let repo = MemoryRepository::new();

    let created = repo.create_user(new_user("fresh", false)).await.unwrap();

    assert_eq!(created.id, 1);
    assert!(created.is_active);
    assert!(!created.is_staff);
}

// --- PostgreSQL (requires DATABASE_URL; run with `--ignored`) ---
// The tests share one database, so they also need `--test-threads=1`.

#[tokio::test]
#[ignore]
async fn test_postgres_bookmark_scoping() {
    let ctx = DbTestContext::setup().await;
    assert_bookmark_scoping(&ctx.repository()).await;
}

#[tokio::test]
#[ignore]
async fn test_postgres_listing_order() {
    let ctx = DbTestContext::setup().await;
    assert_listing_order(&ctx.repository()).await;
}

#[tokio::test]
#[ignore]
async fn test_postgres_username_uniqueness() {
    let ctx = DbTestContext::setup().await;
    assert_username_uniqueness(&ctx.repository()).await;
}

#[tokio::test]
#[ignore]
async fn test_postgres_user_delete_cascades() {
    let ctx = DbTestContext::setup().await;
    assert_user_delete_cascades(&ctx.repository()).await;
}

#[tokio::test]
#[ignore]
async fn test_postgres_rename_follows_bookmarks() {
    let ctx = DbTestContext::setup().await;
    assert_rename_follows_bookmarks(&ctx.repository()).await;
}
