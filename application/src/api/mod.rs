//! REST API definitions.

pub mod session;
pub mod user;

use axum::{
    extract::{rejection::JsonRejection, Path},
    Json,
};
use serde::Serialize;
use service::{
    command::authorize_user_session::Identity,
    domain::user::{self as domain_user, session as domain_session},
};

use crate::{define_error, AsError, Error};

/// Health status of the application.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Health {
    /// Status of the application.
    pub status: &'static str,
}

/// Health check handler.
#[expect(
    clippy::unused_async,
    reason = "`async` is required to match signature"
)]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Unwraps a JSON request body.
///
/// # Errors
///
/// If the body cannot be deserialized.
pub fn body<T>(json: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    json.map(|Json(v)| v).map_err(AsError::into_error)
}

/// Parses a [`domain_user::Id`] from the request path.
///
/// # Errors
///
/// If the path segment is not a valid [`domain_user::Id`].
pub fn user_id(Path(raw): Path<String>) -> Result<domain_user::Id, Error> {
    raw.parse().map_err(|_| PathError::InvalidUserId.into())
}

/// Parses a [`domain_user::Id`] and a [`domain_session::Id`] from the request
/// path.
///
/// # Errors
///
/// If any of the path segments is not a valid ID.
pub fn user_and_session_id(
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<(domain_user::Id, domain_session::Id), Error> {
    Ok((
        self::user_id(Path(user_id))?,
        session_id
            .parse()
            .map_err(|_| Error::from(PathError::InvalidSessionId))?,
    ))
}

/// Ensures that the authorized [`Identity`] acts on its own behalf.
///
/// # Errors
///
/// If the [`Identity`] belongs to another user.
pub fn ensure_owner(
    identity: &Identity,
    user_id: domain_user::Id,
) -> Result<(), Error> {
    if identity.user_id == user_id {
        Ok(())
    } else {
        Err(PrivilegeError::ForeignUser.into())
    }
}

define_error! {
    enum PrivilegeError {
        #[code = "FORBIDDEN"]
        #[status = FORBIDDEN]
        #[message = "Authorized `User` cannot act on behalf of another one"]
        ForeignUser,
    }
}

define_error! {
    enum PathError {
        #[code = "INVALID_USER_ID"]
        #[status = BAD_REQUEST]
        #[message = "`User` ID is invalid"]
        InvalidUserId,

        #[code = "INVALID_SESSION_ID"]
        #[status = BAD_REQUEST]
        #[message = "`Session` ID is invalid"]
        InvalidSessionId,
    }
}
