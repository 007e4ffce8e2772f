//! [`User`]-related definitions.

use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    Extension, Json,
};
use derive_more::Debug;
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, authorize_user_session::Identity, Command as _},
    domain::{self, user},
    query,
};

use crate::{api, define_error, AsError, Error, Service};

/// Client-facing view of a [`domain::User`].
#[derive(Clone, Debug, Serialize)]
pub struct User {
    /// ID of the [`domain::User`].
    pub user_id: user::Id,

    /// [`user::Email`] of the [`domain::User`].
    pub email: user::Email,

    /// [`user::Name`] of the [`domain::User`], if any.
    pub name: Option<user::Name>,

    /// When the [`domain::User`] was created.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub created_at: user::CreationDateTime,

    /// When the [`domain::User`] was modified the last time.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub updated_at: user::ModificationDateTime,
}

impl From<domain::User> for User {
    fn from(u: domain::User) -> Self {
        Self {
            user_id: u.id,
            email: u.email,
            name: u.name,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Credentials of a [`domain::User`].
#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    /// Email of the [`domain::User`].
    pub email: String,

    /// Password of the [`domain::User`].
    #[debug(skip)]
    pub password: String,
}

impl Credentials {
    /// Validates the [`user::Email`] of these [`Credentials`].
    ///
    /// # Errors
    ///
    /// If the email is malformed.
    pub fn email(&self) -> Result<user::Email, Error> {
        user::Email::new(self.email.as_str())
            .ok_or_else(|| InputError::InvalidEmail.into())
    }
}

/// Validates the provided raw `password` and hides it as a secret.
///
/// # Errors
///
/// If the `password` is too short or too long.
pub fn password(raw: String) -> Result<SecretBox<user::Password>, Error> {
    user::Password::new(raw)
        .map(|p| SecretBox::new(Box::new(p)))
        .ok_or_else(|| InputError::InvalidPassword.into())
}

/// Response of [`create()`] handler.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Created {
    /// ID of the created [`domain::User`].
    pub user_id: user::Id,
}

/// Registers a new [`domain::User`].
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_EMAIL` - provided email is malformed;
/// - `INVALID_PASSWORD` - provided password is too short or too long;
/// - `EMAIL_OCCUPIED` - provided email is used by another `User`.
#[tracing::instrument(skip_all, fields(api.name = "users.create"))]
pub async fn create(
    Extension(service): Extension<Service>,
    req: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), Error> {
    let creds = api::body(req)?;
    let email = creds.email()?;

    let user = service
        .execute(command::CreateUser {
            email,
            password: password(creds.password)?,
            name: None,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((StatusCode::CREATED, Json(Created { user_id: user.id })))
}

/// Returns the authorized [`domain::User`].
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one.
#[tracing::instrument(skip_all, fields(api.name = "users.get"))]
pub async fn get(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<String>,
) -> Result<Json<User>, Error> {
    let user_id = api::user_id(path)?;
    api::ensure_owner(&identity, user_id)?;

    service
        .execute(query::user::ById::by(user_id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| UserError::NotExists.into())
        .map(|u| Json(u.into()))
}

/// Request of [`update_name()`] handler.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateName {
    /// New name of the [`domain::User`].
    pub name: String,
}

/// Renames the authorized [`domain::User`].
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one;
/// - `INVALID_NAME` - provided name is empty, padded or too long.
#[tracing::instrument(skip_all, fields(api.name = "users.update"))]
pub async fn update_name(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<String>,
    req: Result<Json<UpdateName>, JsonRejection>,
) -> Result<Json<User>, Error> {
    let user_id = api::user_id(path)?;
    api::ensure_owner(&identity, user_id)?;
    let UpdateName { name } = api::body(req)?;

    service
        .execute(command::UpdateUserName {
            user_id,
            name: user::Name::new(name)
                .ok_or_else(|| Error::from(InputError::InvalidName))?,
        })
        .await
        .map_err(AsError::into_error)
        .map(|u| Json(u.into()))
}

/// Request of [`update_password()`] handler.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdatePassword {
    /// Current password of the [`domain::User`].
    #[debug(skip)]
    pub old_password: String,

    /// New password of the [`domain::User`].
    #[debug(skip)]
    pub new_password: String,
}

/// Changes password of the authorized [`domain::User`], revoking all its
/// sessions.
///
/// # Errors
///
/// Possible error codes:
/// - `FORBIDDEN` - path `User` is not the authorized one;
/// - `INVALID_PASSWORD` - provided password is too short or too long;
/// - `WRONG_PASSWORD` - `old_password` doesn't match the current one.
#[tracing::instrument(skip_all, fields(api.name = "users.password.update"))]
pub async fn update_password(
    Extension(service): Extension<Service>,
    Extension(identity): Extension<Identity>,
    path: Path<String>,
    req: Result<Json<UpdatePassword>, JsonRejection>,
) -> Result<Json<User>, Error> {
    let user_id = api::user_id(path)?;
    api::ensure_owner(&identity, user_id)?;
    let UpdatePassword {
        old_password,
        new_password,
    } = api::body(req)?;

    service
        .execute(command::UpdateUserPassword {
            user_id,
            new_password: password(new_password)?,
            old_password: password(old_password)?,
        })
        .await
        .map_err(AsError::into_error)
        .map(|u| Json(u.into()))
}

define_error! {
    enum InputError {
        #[code = "INVALID_EMAIL"]
        #[status = BAD_REQUEST]
        #[message = "Email is malformed"]
        InvalidEmail,

        #[code = "INVALID_PASSWORD"]
        #[status = BAD_REQUEST]
        #[message = "Password must be 8 to 128 characters long"]
        InvalidPassword,

        #[code = "INVALID_NAME"]
        #[status = BAD_REQUEST]
        #[message = "Name must be non-empty, unpadded and at most 512 bytes \
                     long"]
        InvalidName,
    }
}

define_error! {
    enum UserError {
        #[code = "USER_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`User` does not exist"]
        NotExists,
    }
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "EMAIL_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "Email is occupied by another `User`"]
                EmailOccupied,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EmailOccupied(_) => Some(Error::EmailOccupied.into()),
            Self::PasswordHash(_) => None,
        }
    }
}

impl AsError for command::update_user_name::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::UserNotExists(_) => Some(UserError::NotExists.into()),
        }
    }
}

impl AsError for command::update_user_password::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_PASSWORD"]
                #[status = BAD_REQUEST]
                #[message = "Provided `old_password` does not match the \
                             current one"]
                WrongPassword,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::UserNotExists(_) => Some(UserError::NotExists.into()),
            Self::WrongPassword => Some(Error::WrongPassword.into()),
            Self::PasswordHash(_) => None,
        }
    }
}
