//! Resource controllers.
//!
//! Each resource implements [`Resource`] explicitly, one method per verb. A method first
//! asks the access policy whether the caller may act at all, then derives the visible set
//! and pushes it into the store query. Row-scoped misses always surface as `NotFound`.

use async_trait::async_trait;
use serde::Serialize;

use crate::{auth::AuthUser, error::ApiError, serializers::Payload};

pub mod bookmarks;
pub mod users;

pub use bookmarks::BookmarkResource;
pub use users::UserResource;

#[async_trait]
pub trait Resource: Send + Sync {
    /// The serialized representation returned to clients.
    type Repr: Serialize + Send;

    /// 200 with every row in the caller's visible set.
    async fn list(&self, caller: Option<&AuthUser>) -> Result<Vec<Self::Repr>, ApiError>;

    /// 201 with the created row.
    async fn create(
        &self,
        caller: Option<&AuthUser>,
        payload: Payload,
    ) -> Result<Self::Repr, ApiError>;

    /// 200 with the row, or `NotFound` if it is outside the visible set.
    async fn retrieve(&self, caller: Option<&AuthUser>, id: i64) -> Result<Self::Repr, ApiError>;

    /// Full replace. The row is resolved before the payload is validated.
    async fn update(
        &self,
        caller: Option<&AuthUser>,
        id: i64,
        payload: Payload,
    ) -> Result<Self::Repr, ApiError>;

    /// 204 on success.
    async fn delete(&self, caller: Option<&AuthUser>, id: i64) -> Result<(), ApiError>;
}
