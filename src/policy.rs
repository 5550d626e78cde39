//! Access policy.
//!
//! Two questions are answered here and nowhere else: may this caller invoke the action at
//! all ([`authorize`]), and which rows may it see or touch ([`bookmark_scope`],
//! [`user_scope`]). Both are pure so the rules can be tested without a store.

use crate::{auth::AuthUser, error::ApiError};

/// The verb a request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    Delete,
}

impl Action {
    /// Collection-level actions are the only ones staff may be elevated on.
    pub fn is_collection(self) -> bool {
        matches!(self, Action::List | Action::Create)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Bookmarks,
    Users,
}

/// Scope
///
/// The visible set for one request, expressed as a query filter. For bookmarks
/// `OwnedBy(id)` filters on `owner_id`; for users it filters on the row id itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Unrestricted,
    OwnedBy(i64),
}

impl Scope {
    /// The owner filter to bind into a query, `None` when every row is visible.
    pub fn owner(self) -> Option<i64> {
        match self {
            Scope::Unrestricted => None,
            Scope::OwnedBy(id) => Some(id),
        }
    }

    pub fn admits(self, owner_id: i64) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::OwnedBy(id) => id == owner_id,
        }
    }
}

/// authorize
///
/// Decides whether `caller` may invoke `action` on `kind` at all.
///
/// Authentication is checked before authorization: an anonymous caller gets
/// `Unauthenticated` for anything except user registration, even where an authenticated
/// caller would have been refused with `Forbidden`.
pub fn authorize(
    kind: ResourceKind,
    action: Action,
    caller: Option<&AuthUser>,
) -> Result<(), ApiError> {
    if kind == ResourceKind::Users && action == Action::Create {
        return Ok(());
    }

    let caller = caller.ok_or_else(ApiError::unauthenticated)?;

    match (kind, action) {
        (ResourceKind::Users, Action::List) if !caller.is_staff => Err(ApiError::Forbidden),
        _ => Ok(()),
    }
}

/// Visible bookmarks: staff may list everything, every other action sees only its own rows.
pub fn bookmark_scope(caller: &AuthUser, action: Action) -> Scope {
    if action == Action::List && caller.is_staff {
        Scope::Unrestricted
    } else {
        Scope::OwnedBy(caller.id)
    }
}

/// Visible users: the full list for (already authorized) listing, otherwise only the
/// caller's own record, staff included.
pub fn user_scope(caller: &AuthUser, action: Action) -> Scope {
    if action.is_collection() {
        Scope::Unrestricted
    } else {
        Scope::OwnedBy(caller.id)
    }
}
