//! [`Session`]-related definitions.
//!
//! [`Session`]: domain::Session

use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::{headers, TypedHeader};
use derive_more::Debug;
use serde::{Deserialize, Serialize};
use service::{
    command::{
        self, authorize_user_session::Identity, drop_user_sessions,
        Command as _,
    },
    domain::{self, user::session},
    query, read,
};

use crate::{
    api::{self, user::Credentials},
    define_error,
    guard::{DeviceHeaders, Fingerprint},
    AsError, Error, Service,
};

/// Opens a new [`domain::Session`] of the [`domain::User`] on the requesting
/// device, revoking the previous one on the same device.
///
/// # Errors
///
/// Possible error codes:
/// - `WRONG_CREDENTIALS` - provided credentials don't match the path `User`;
/// - `MISSING_USER_AGENT` - `User-Agent` header is missing;
/// - `MISSING_FINGERPRINT` - `X-Fingerprint` header is missing.
#[tracing::instrument(skip_all, fields(api.name = "sessions.create"))]
pub async fn create(
    Extension(service): Extension<Service>,
    path: Path<String>,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    fingerprint: Option<TypedHeader<Fingerprint>>,
    req: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<session::TokenPair>, Error> {
    let user_id = api::user_id(path)?;
    let creds = api::body(req)?;
    let device = DeviceHeaders::new(user_agent, fingerprint).into_device()?;

    let email = creds.email()?;
    let user = service
        .execute(command::AuthenticateUser {
            email,
            password: api::user::password(creds.password)
                .map_err(|_| Error::from(CredentialsError::Wrong))?,
        })
        .await
        .map_err(AsError::into_error)?;
    if user.id != user_id {
        return Err(CredentialsError::Wrong.into());
    }

    service
        .execute(command::CreateUserSession { user_id, device })
        .await
        .map_err(AsError::into_error)
        .map(Json)
}

/// Request of [`refresh()`] handler.
#[derive(Clone, Debug, Deserialize)]
pub struct Refresh {
    /// Refresh token to redeem.
    #[debug(skip)]
    pub refresh_token: String,
}

/// Rotates the [`domain::Session`] of the presented refresh token.
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one;
/// - `UNKNOWN_REFRESH_TOKEN` - refresh token doesn't match any `Session`;
/// - `REFRESH_TOKEN_EXPIRED` - `Session` of the refresh token is expired.
#[tracing::instrument(skip_all, fields(api.name = "sessions.refresh"))]
pub async fn refresh(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<String>,
    req: Result<Json<Refresh>, JsonRejection>,
) -> Result<Json<session::TokenPair>, Error> {
    let user_id = api::user_id(path)?;
    api::ensure_owner(&identity, user_id)?;
    let Refresh { refresh_token } = api::body(req)?;

    service
        .execute(command::RefreshUserSession {
            refresh_token: refresh_token.into(),
            user_id,
            device: identity.device,
        })
        .await
        .map_err(AsError::into_error)
        .map(Json)
}

/// Response of [`list()`] handler.
#[derive(Clone, Debug, Serialize)]
pub struct Sessions {
    /// [`domain::Session`]s of the [`domain::User`].
    pub sessions: Vec<read::session::Session>,
}

/// Lists [`domain::Session`]s of the authorized [`domain::User`].
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one.
#[tracing::instrument(skip_all, fields(api.name = "sessions.list"))]
pub async fn list(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<String>,
) -> Result<Json<Sessions>, Error> {
    let user_id = api::user_id(path)?;
    api::ensure_owner(&identity, user_id)?;

    service
        .execute(query::sessions::ByUser {
            user_id,
            device: None,
        })
        .await
        .map_err(AsError::into_error)
        .map(|sessions| Json(Sessions { sessions }))
}

/// Revokes every [`domain::Session`] of the authorized [`domain::User`].
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one.
#[tracing::instrument(skip_all, fields(api.name = "sessions.revoke_all"))]
pub async fn revoke_all(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<String>,
) -> Result<Json<drop_user_sessions::Output>, Error> {
    let user_id = api::user_id(path)?;
    api::ensure_owner(&identity, user_id)?;

    service
        .execute(command::DropUserSessions {
            user_id,
            device: None,
        })
        .await
        .map_err(AsError::into_error)
        .map(Json)
}

/// Returns a [`domain::Session`] of the authorized [`domain::User`].
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one;
/// - `INVALID_SESSION_ID` - path `Session` ID is malformed;
/// - `SESSION_NOT_FOUND` - `User` has no such `Session`.
#[tracing::instrument(skip_all, fields(api.name = "sessions.get"))]
pub async fn get(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<(String, String)>,
) -> Result<Json<read::session::Session>, Error> {
    let (user_id, session_id) = api::user_and_session_id(path)?;
    api::ensure_owner(&identity, user_id)?;

    owned(&service, user_id, session_id).await.map(Json)
}

/// Revokes a [`domain::Session`] of the authorized [`domain::User`].
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one;
/// - `INVALID_SESSION_ID` - path `Session` ID is malformed;
/// - `SESSION_NOT_FOUND` - `User` has no such `Session`.
#[tracing::instrument(skip_all, fields(api.name = "sessions.revoke"))]
pub async fn revoke(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<(String, String)>,
) -> Result<StatusCode, Error> {
    let (user_id, session_id) = api::user_and_session_id(path)?;
    api::ensure_owner(&identity, user_id)?;
    _ = owned(&service, user_id, session_id).await?;

    service
        .execute(command::DropUserSession { session_id })
        .await
        .map_err(AsError::into_error)
        .map(|()| StatusCode::NO_CONTENT)
}

/// Looks up a [`domain::Session`] owned by the provided [`domain::User`].
async fn owned(
    service: &Service,
    user_id: domain::user::Id,
    session_id: session::Id,
) -> Result<read::session::Session, Error> {
    service
        .execute(query::session::ById(session_id))
        .await
        .map_err(AsError::into_error)?
        .filter(|s| s.user_id == user_id)
        .ok_or_else(|| SessionError::NotFound.into())
}

define_error! {
    enum CredentialsError {
        #[code = "WRONG_CREDENTIALS"]
        #[status = BAD_REQUEST]
        #[message = "Provided credentials do not match the `User`"]
        Wrong,
    }
}

define_error! {
    enum SessionError {
        #[code = "SESSION_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`Session` does not exist"]
        NotFound,
    }
}

impl AsError for command::authenticate_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::WrongCredentials => Some(CredentialsError::Wrong.into()),
        }
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Token(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::refresh_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "UNKNOWN_REFRESH_TOKEN"]
                #[status = NOT_FOUND]
                #[message = "Refresh token does not match any `Session`"]
                UnknownToken,

                #[code = "REFRESH_TOKEN_EXPIRED"]
                #[status = UNAUTHORIZED]
                #[message = "`Session` of the refresh token is expired"]
                ExpiredToken,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Token(e) => e.try_as_error(),
            Self::UnknownToken => Some(Error::UnknownToken.into()),
            Self::ExpiredToken => Some(Error::ExpiredToken.into()),
        }
    }
}

impl AsError for command::drop_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::drop_user_sessions::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}
