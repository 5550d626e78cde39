use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use ts_rs::TS;
use url::Url;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    models::{Bookmark, BookmarkFields, User},
};

const NAME_MAX_LEN: usize = 255;
const URL_MAX_LEN: usize = 200;
const USERNAME_MAX_LEN: usize = 150;

// --- Output Representations ---

/// BookmarkRepr
///
/// Wire shape of a bookmark. Field order is part of the contract: clients compare the
/// compact encoding byte for byte. `owner_id` and `owner_username` are derived from the
/// owner and are never read back from input.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct BookmarkRepr {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner_id: i64,
    pub owner_username: String,
}

impl From<Bookmark> for BookmarkRepr {
    fn from(row: Bookmark) -> Self {
        Self {
            id: row.id,
            name: row.name,
            url: row.url,
            owner_id: row.owner_id,
            owner_username: row.owner_username,
        }
    }
}

/// UserRepr
///
/// Wire shape of a user. The password is write-only and therefore has no field here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct UserRepr {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<User> for UserRepr {
    fn from(row: User) -> Self {
        Self {
            id: row.id,
            username: row.username,
            is_staff: row.is_staff,
        }
    }
}

// --- Input Payloads ---

/// BookmarkInput
///
/// Body of POST/PUT `/bookmarks/`. Unknown keys such as `owner` or `owner_id` are dropped
/// by serde; ownership is assigned server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BookmarkInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl BookmarkInput {
    /// Full-replace validation: both writable fields are required on create and update.
    pub fn validate(self) -> Result<BookmarkFields, ApiError> {
        let mut errors = FieldErrors::default();

        let name = errors.check("name", required_text(self.name, NAME_MAX_LEN, true));
        let url = errors.check(
            "url",
            required_text(self.url, URL_MAX_LEN, true).and_then(|url| absolute_http_url(&url).map(|_| url)),
        );

        match (name, url) {
            (Some(name), Some(url)) if errors.is_empty() => Ok(BookmarkFields { name, url }),
            _ => Err(errors.into_error()),
        }
    }
}

/// UserInput
///
/// Body of POST `/users/` and PUT `/users/{id}/`. `is_staff` is read-only, so a client
/// sending it is silently ignored like any other unknown key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Validated registration/update input. The password is still plaintext here; the users
/// controller hashes it before anything reaches the store.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl UserInput {
    pub fn validate(self) -> Result<Credentials, ApiError> {
        let mut errors = FieldErrors::default();

        let username = errors.check(
            "username",
            required_text(self.username, USERNAME_MAX_LEN, true).and_then(valid_username),
        );
        let password = errors.check("password", required_text(self.password, usize::MAX, false));

        match (username, password) {
            (Some(username), Some(password)) if errors.is_empty() => {
                Ok(Credentials { username, password })
            }
            _ => Err(errors.into_error()),
        }
    }
}

/// Body of POST `/api-token-auth/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// TokenResponse
///
/// Issued JWT, sent back by the client as `Authorization: JWT <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

// --- Field Validation ---

/// Collects per-field messages so a single 400 reports every problem at once.
#[derive(Default)]
struct FieldErrors(Vec<String>);

impl FieldErrors {
    fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.0.push(format!("{field}: {message}"));
                None
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_error(self) -> ApiError {
        ApiError::ValidationFailed(self.0.join(" "))
    }
}

fn required_text(value: Option<String>, max_len: usize, trim: bool) -> Result<String, String> {
    let value = value.ok_or("This field is required.")?;
    let value = if trim { value.trim().to_string() } else { value };

    if value.trim().is_empty() {
        return Err("This field may not be blank.".into());
    }
    if value.chars().count() > max_len {
        return Err(format!("Ensure this field has no more than {max_len} characters."));
    }
    Ok(value)
}

fn valid_username(username: String) -> Result<String, String> {
    let allowed = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
    if username.chars().all(allowed) {
        Ok(username)
    } else {
        Err("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.".into())
    }
}

fn absolute_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|_| "Enter a valid URL.")?;
    match (url.scheme(), url.host_str()) {
        ("http" | "https", Some(_)) => Ok(url),
        _ => Err("Enter a valid URL.".into()),
    }
}

// --- Request Body Extraction ---

/// Payload
///
/// The raw request body, parsed on demand rather than by the extractor. Single-row
/// controllers resolve the target row inside the caller's scope first, so an out-of-scope
/// PUT answers 404 even when its body would not have validated.
#[derive(Debug, Clone, Default)]
pub struct Payload(pub Bytes);

impl Payload {
    /// Wraps a serializable value, for calling controllers directly.
    pub fn json<T: Serialize>(value: &T) -> Self {
        Payload(Bytes::from(serde_json::to_vec(value).unwrap_or_default()))
    }

    /// parse
    ///
    /// Decodes the body into `T`. An empty body reads as `{}`, so missing fields are reported
    /// per field instead of as a parse error. Anything other than a JSON object is rejected.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.0.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_value(Value::Object(Default::default()))
                .map_err(|e| ApiError::validation(format!("Invalid input: {e}")));
        }

        let value: Value = serde_json::from_slice(&self.0)
            .map_err(|e| ApiError::validation(format!("JSON parse error - {e}")))?;

        let kind = match &value {
            Value::Object(_) => None,
            Value::Array(_) => Some("list"),
            Value::String(_) => Some("str"),
            Value::Number(_) => Some("int"),
            Value::Bool(_) => Some("bool"),
            Value::Null => Some("NoneType"),
        };
        if let Some(kind) = kind {
            return Err(ApiError::validation(format!(
                "Invalid data. Expected a dictionary, but got {kind}."
            )));
        }

        serde_json::from_value(value).map_err(|e| ApiError::validation(format!("Invalid input: {e}")))
    }
}

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        Ok(Payload(bytes))
    }
}
