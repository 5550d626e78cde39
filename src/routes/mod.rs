//! Router Module Index
//!
//! Routes are split by how identity is established. Paths keep their trailing slash; the
//! slash-less variants are not served.

/// Routes reachable without credentials. Handlers that still need an identity take
/// `Option<AuthUser>` and let the access policy decide.
pub mod public;

/// Routes behind the auth middleware. Anonymous requests are rejected with 401 before
/// any handler runs.
pub mod authenticated;
