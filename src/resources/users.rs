use async_trait::async_trait;

use super::Resource;
use crate::{
    auth::{AuthUser, hash_password_blocking},
    error::ApiError,
    models::{NewUser, UserFields},
    policy::{self, Action, ResourceKind},
    repository::RepositoryState,
    serializers::{Payload, UserInput, UserRepr},
};

/// UserResource
///
/// Registration is open to anonymous callers and listing is staff-only. Every
/// single-row action is restricted to the caller's own record, with no staff exception.
pub struct UserResource {
    repo: RepositoryState,
}

impl UserResource {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Policy check for actions that require an identity.
    fn authorize<'a>(caller: Option<&'a AuthUser>, action: Action) -> Result<&'a AuthUser, ApiError> {
        policy::authorize(ResourceKind::Users, action, caller)?;
        caller.ok_or_else(ApiError::unauthenticated)
    }

    /// Validates the payload and hashes the plaintext password off the runtime workers.
    async fn writable_fields(payload: &Payload) -> Result<UserFields, ApiError> {
        let credentials = payload.parse::<UserInput>()?.validate()?;
        Ok(UserFields {
            username: credentials.username,
            password_hash: hash_password_blocking(credentials.password).await?,
        })
    }
}

#[async_trait]
impl Resource for UserResource {
    type Repr = UserRepr;

    async fn list(&self, caller: Option<&AuthUser>) -> Result<Vec<UserRepr>, ApiError> {
        let caller = Self::authorize(caller, Action::List)?;
        let scope = policy::user_scope(caller, Action::List);

        let rows = self.repo.list_users(scope).await?;
        Ok(rows.into_iter().map(UserRepr::from).collect())
    }

    /// Self-registration. The new account is never staff.
    async fn create(&self, caller: Option<&AuthUser>, payload: Payload) -> Result<UserRepr, ApiError> {
        policy::authorize(ResourceKind::Users, Action::Create, caller)?;
        let fields = Self::writable_fields(&payload).await?;

        let created = self.repo.create_user(NewUser::regular(fields)).await?;
        tracing::info!(user_id = created.id, username = %created.username, "user registered");
        Ok(created.into())
    }

    async fn retrieve(&self, caller: Option<&AuthUser>, id: i64) -> Result<UserRepr, ApiError> {
        let caller = Self::authorize(caller, Action::Retrieve)?;
        let scope = policy::user_scope(caller, Action::Retrieve);

        self.repo
            .find_user(id, scope)
            .await?
            .map(UserRepr::from)
            .ok_or(ApiError::NotFound)
    }

    async fn update(
        &self,
        caller: Option<&AuthUser>,
        id: i64,
        payload: Payload,
    ) -> Result<UserRepr, ApiError> {
        let caller = Self::authorize(caller, Action::Update)?;
        let scope = policy::user_scope(caller, Action::Update);

        if self.repo.find_user(id, scope).await?.is_none() {
            return Err(ApiError::NotFound);
        }
        let fields = Self::writable_fields(&payload).await?;

        self.repo
            .update_user(id, scope, fields)
            .await?
            .map(UserRepr::from)
            .ok_or(ApiError::NotFound)
    }

    async fn delete(&self, caller: Option<&AuthUser>, id: i64) -> Result<(), ApiError> {
        let caller = Self::authorize(caller, Action::Delete)?;
        let scope = policy::user_scope(caller, Action::Delete);

        if self.repo.delete_user(id, scope).await? {
            tracing::info!(user_id = id, "user deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}
