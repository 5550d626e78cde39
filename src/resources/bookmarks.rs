use async_trait::async_trait;

use super::Resource;
use crate::{
    auth::AuthUser,
    error::ApiError,
    policy::{self, Action, ResourceKind},
    repository::RepositoryState,
    serializers::{BookmarkInput, BookmarkRepr, Payload},
};

/// BookmarkResource
///
/// Bookmarks are always owned by whoever created them. Staff only gain the unrestricted
/// listing; retrieve/update/delete are scoped to the caller's own rows for everyone.
pub struct BookmarkResource {
    repo: RepositoryState,
}

impl BookmarkResource {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    fn authorize<'a>(caller: Option<&'a AuthUser>, action: Action) -> Result<&'a AuthUser, ApiError> {
        policy::authorize(ResourceKind::Bookmarks, action, caller)?;
        caller.ok_or_else(ApiError::unauthenticated)
    }
}

#[async_trait]
impl Resource for BookmarkResource {
    type Repr = BookmarkRepr;

    async fn list(&self, caller: Option<&AuthUser>) -> Result<Vec<BookmarkRepr>, ApiError> {
        let caller = Self::authorize(caller, Action::List)?;
        let scope = policy::bookmark_scope(caller, Action::List);

        let rows = self.repo.list_bookmarks(scope).await?;
        Ok(rows.into_iter().map(BookmarkRepr::from).collect())
    }

    /// The owner is the caller, whatever the payload says.
    async fn create(
        &self,
        caller: Option<&AuthUser>,
        payload: Payload,
    ) -> Result<BookmarkRepr, ApiError> {
        let caller = Self::authorize(caller, Action::Create)?;
        let fields = payload.parse::<BookmarkInput>()?.validate()?;

        let created = self.repo.create_bookmark(caller.id, fields).await?;
        tracing::info!(bookmark_id = created.id, owner_id = caller.id, "bookmark created");
        Ok(created.into())
    }

    async fn retrieve(&self, caller: Option<&AuthUser>, id: i64) -> Result<BookmarkRepr, ApiError> {
        let caller = Self::authorize(caller, Action::Retrieve)?;
        let scope = policy::bookmark_scope(caller, Action::Retrieve);

        self.repo
            .find_bookmark(id, scope)
            .await?
            .map(BookmarkRepr::from)
            .ok_or(ApiError::NotFound)
    }

    async fn update(
        &self,
        caller: Option<&AuthUser>,
        id: i64,
        payload: Payload,
    ) -> Result<BookmarkRepr, ApiError> {
        let caller = Self::authorize(caller, Action::Update)?;
        let scope = policy::bookmark_scope(caller, Action::Update);

        if self.repo.find_bookmark(id, scope).await?.is_none() {
            return Err(ApiError::NotFound);
        }
        let fields = payload.parse::<BookmarkInput>()?.validate()?;

        // The row may have been deleted between the lookup and the write.
        self.repo
            .update_bookmark(id, scope, fields)
            .await?
            .map(BookmarkRepr::from)
            .ok_or(ApiError::NotFound)
    }

    async fn delete(&self, caller: Option<&AuthUser>, id: i64) -> Result<(), ApiError> {
        let caller = Self::authorize(caller, Action::Delete)?;
        let scope = policy::bookmark_scope(caller, Action::Delete);

        if self.repo.delete_bookmark(id, scope).await? {
            tracing::info!(bookmark_id = id, owner_id = caller.id, "bookmark deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}
