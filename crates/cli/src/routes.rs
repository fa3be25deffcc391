//! Landing routes and role guards

use hepatica_core::{Role, Session, User};
use std::fmt;
use thiserror::Error;

/// Where a user lands for a given session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard(Role),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("/login"),
            Self::Dashboard(role) => write!(f, "/dashboard/{role}"),
        }
    }
}

/// Rejection from [`authorize`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("not signed in, please log in with `hepatica login`")]
    NotSignedIn,

    #[error("unauthorized: this command requires the {required} role")]
    Forbidden { required: Role },
}

/// `/dashboard/<role>` for an authenticated session, `/login` otherwise
pub fn landing_route(session: &Session) -> Route {
    match session.user() {
        Some(user) if session.is_authenticated() => Route::Dashboard(user.role),
        _ => Route::Login,
    }
}

/// Require a signed-in user, optionally with a specific role
pub fn authorize(session: &Session, required: Option<Role>) -> Result<&User, AccessError> {
    let user = session
        .user()
        .filter(|_| session.is_authenticated())
        .ok_or(AccessError::NotSignedIn)?;

    match required {
        Some(role) if user.role != role => Err(AccessError::Forbidden { required: role }),
        _ => Ok(user),
    }
}
