use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{ApiError, ErrorBody},
    resources::Resource,
    serializers::{
        BookmarkInput, BookmarkRepr, Payload, TokenRequest, TokenResponse, UserInput, UserRepr,
    },
};
use axum::{
    Json,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
};

const INVALID_LOGIN: &str = "Unable to log in with provided credentials.";

// --- Extractors ---

/// RowId
///
/// The `{id}` path segment. Anything that is not an integer cannot name a row, so it is
/// reported as 404 like any other row outside the caller's visible set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowId(pub i64);

impl<S> FromRequestParts<S> for RowId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::NotFound)?;

        raw.parse::<i64>().map(RowId).map_err(|_| ApiError::NotFound)
    }
}

// --- Bookmarks ---

/// list_bookmarks
///
/// [Authenticated Route] Staff see every bookmark ordered by owner; everyone else sees
/// their own.
#[utoipa::path(
    get,
    path = "/bookmarks/",
    responses(
        (status = 200, description = "Visible bookmarks", body = [BookmarkRepr]),
        (status = 401, description = "Anonymous", body = ErrorBody)
    )
)]
pub async fn list_bookmarks(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<BookmarkRepr>>, ApiError> {
    state.bookmarks().list(Some(&user)).await.map(Json)
}

/// create_bookmark
///
/// [Authenticated Route] The owner is always the authenticated caller.
#[utoipa::path(
    post,
    path = "/bookmarks/",
    request_body = BookmarkInput,
    responses(
        (status = 201, description = "Created", body = BookmarkRepr),
        (status = 400, description = "Invalid body", body = ErrorBody),
        (status = 401, description = "Anonymous", body = ErrorBody)
    )
)]
pub async fn create_bookmark(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Payload,
) -> Result<(StatusCode, Json<BookmarkRepr>), ApiError> {
    let created = state.bookmarks().create(Some(&user), payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// get_bookmark
///
/// [Authenticated Route] Someone else's bookmark is reported exactly like a missing one.
#[utoipa::path(
    get,
    path = "/bookmarks/{id}/",
    params(("id" = i64, Path, description = "Bookmark ID")),
    responses(
        (status = 200, description = "Found", body = BookmarkRepr),
        (status = 404, description = "Not owned or absent", body = ErrorBody)
    )
)]
pub async fn get_bookmark(
    user: AuthUser,
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<BookmarkRepr>, ApiError> {
    state.bookmarks().retrieve(Some(&user), id).await.map(Json)
}

/// update_bookmark
///
/// [Authenticated Route] Full replace of `name` and `url`.
#[utoipa::path(
    put,
    path = "/bookmarks/{id}/",
    params(("id" = i64, Path, description = "Bookmark ID")),
    request_body = BookmarkInput,
    responses(
        (status = 200, description = "Updated", body = BookmarkRepr),
        (status = 400, description = "Invalid body", body = ErrorBody),
        (status = 404, description = "Not owned or absent", body = ErrorBody)
    )
)]
pub async fn update_bookmark(
    user: AuthUser,
    State(state): State<AppState>,
    RowId(id): RowId,
    payload: Payload,
) -> Result<Json<BookmarkRepr>, ApiError> {
    state.bookmarks().update(Some(&user), id, payload).await.map(Json)
}

/// delete_bookmark
///
/// [Authenticated Route] 204 on success, 404 if the bookmark is not the caller's.
#[utoipa::path(
    delete,
    path = "/bookmarks/{id}/",
    params(("id" = i64, Path, description = "Bookmark ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not owned or absent", body = ErrorBody)
    )
)]
pub async fn delete_bookmark(
    user: AuthUser,
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<StatusCode, ApiError> {
    state.bookmarks().delete(Some(&user), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Users ---

/// list_users
///
/// [Public Route] Identity is optional at the routing level so the access policy can
/// answer 401 for anonymous callers and 403 for non-staff ones.
#[utoipa::path(
    get,
    path = "/users/",
    responses(
        (status = 200, description = "All users", body = [UserRepr]),
        (status = 401, description = "Anonymous", body = ErrorBody),
        (status = 403, description = "Not staff", body = ErrorBody)
    )
)]
pub async fn list_users(
    user: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserRepr>>, ApiError> {
    state.users().list(user.as_ref()).await.map(Json)
}

/// register_user
///
/// [Public Route] Self-registration. The response never contains the password and the
/// account is never staff.
#[utoipa::path(
    post,
    path = "/users/",
    request_body = UserInput,
    responses(
        (status = 201, description = "Registered", body = UserRepr),
        (status = 400, description = "Invalid body or duplicate username", body = ErrorBody)
    )
)]
pub async fn register_user(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    payload: Payload,
) -> Result<(StatusCode, Json<UserRepr>), ApiError> {
    let created = state.users().create(user.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// get_user
///
/// [Authenticated Route] Only the caller's own record is visible, even to staff.
#[utoipa::path(
    get,
    path = "/users/{id}/",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserRepr),
        (status = 404, description = "Not the caller", body = ErrorBody)
    )
)]
pub async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<UserRepr>, ApiError> {
    state.users().retrieve(Some(&user), id).await.map(Json)
}

#[utoipa::path(
    put,
    path = "/users/{id}/",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UserInput,
    responses(
        (status = 200, description = "Updated", body = UserRepr),
        (status = 400, description = "Invalid body", body = ErrorBody),
        (status = 404, description = "Not the caller", body = ErrorBody)
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    RowId(id): RowId,
    payload: Payload,
) -> Result<Json<UserRepr>, ApiError> {
    state.users().update(Some(&user), id, payload).await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/users/{id}/",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not the caller", body = ErrorBody)
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<StatusCode, ApiError> {
    state.users().delete(Some(&user), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Tokens ---

/// obtain_token
///
/// [Public Route] Exchanges a username and password for a JWT. Unknown users, wrong
/// passwords and disabled accounts all get the same 400 so usernames cannot be probed.
#[utoipa::path(
    post,
    path = "/api-token-auth/",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Bad credentials", body = ErrorBody)
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<TokenResponse>, ApiError> {
    let request = payload.parse::<TokenRequest>()?;
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(ApiError::validation(INVALID_LOGIN));
    };

    let candidate = state
        .repo
        .find_user_by_username(&username)
        .await?
        .filter(|user| user.is_active);

    let verified = match &candidate {
        Some(user) => auth::verify_password_blocking(user.password.clone(), password).await,
        None => false,
    };

    let Some(user) = candidate.filter(|_| verified) else {
        tracing::debug!(%username, "rejected login");
        return Err(ApiError::validation(INVALID_LOGIN));
    };

    let token = auth::issue_token(&user, &state.config)?;
    Ok(Json(TokenResponse { token }))
}
