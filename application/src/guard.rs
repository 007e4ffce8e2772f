//! Request guards authorizing requests by their [`Session`] tokens.
//!
//! [`Session`]: service::domain::Session

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
    Extension,
};
use axum_extra::{headers, TypedHeader};
use service::{
    command::{
        self,
        authorize_user_session::{Identity, Scope},
        Command as _,
    },
    domain::user::session,
    token,
};

use crate::{api, define_error, AsError, Error, Service};

/// Name of the [`Fingerprint`] header.
pub static FINGERPRINT: http::HeaderName =
    http::HeaderName::from_static("x-fingerprint");

/// `X-Fingerprint` header carrying an opaque fingerprint of a client device.
#[derive(Clone, Debug)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the value of this [`Fingerprint`] header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl headers::Header for Fingerprint {
    fn name() -> &'static http::HeaderName {
        &FINGERPRINT
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i http::HeaderValue>,
    {
        values
            .next()
            .and_then(|v| v.to_str().ok())
            .map(|v| Self(v.to_owned()))
            .ok_or_else(headers::Error::invalid)
    }

    fn encode<E: Extend<http::HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = http::HeaderValue::from_str(&self.0) {
            values.extend([value]);
        }
    }
}

/// Device headers of a request.
#[derive(Clone, Debug)]
pub struct DeviceHeaders {
    /// `User-Agent` header, if any.
    pub user_agent: Option<session::UserAgent>,

    /// `X-Fingerprint` header, if any.
    pub fingerprint: Option<session::Fingerprint>,
}

impl DeviceHeaders {
    /// Collects [`DeviceHeaders`] from the extracted typed headers.
    ///
    /// Empty headers are treated as missing ones.
    #[must_use]
    pub fn new(
        user_agent: Option<TypedHeader<headers::UserAgent>>,
        fingerprint: Option<TypedHeader<Fingerprint>>,
    ) -> Self {
        Self {
            user_agent: user_agent
                .and_then(|TypedHeader(ua)| session::UserAgent::new(ua.as_str())),
            fingerprint: fingerprint.and_then(|TypedHeader(fp)| {
                session::Fingerprint::new(fp.as_str())
            }),
        }
    }

    /// Converts these [`DeviceHeaders`] into a [`session::Device`].
    ///
    /// # Errors
    ///
    /// If any of the headers is missing.
    pub fn into_device(self) -> Result<session::Device, Error> {
        Ok(session::Device {
            user_agent: self
                .user_agent
                .ok_or_else(|| Error::from(DeviceError::MissingUserAgent))?,
            fingerprint: self
                .fingerprint
                .ok_or_else(|| Error::from(DeviceError::MissingFingerprint))?,
        })
    }
}

/// Guard of protected routes.
///
/// Requires an unexpired access token being the latest one of its live
/// [`Session`] on the same device, and puts its [`Identity`] into the request
/// extensions.
///
/// [`Session`]: service::domain::Session
///
/// # Errors
///
/// If the request cannot be authorized.
pub async fn access(
    Extension(service): Extension<Service>,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    fingerprint: Option<TypedHeader<Fingerprint>>,
    req: Request,
    next: Next,
) -> Result<Response, Error> {
    let device = DeviceHeaders::new(user_agent, fingerprint);
    authorize(&service, device, Scope::Access, req, next).await
}

/// Guard of the session rotation route.
///
/// Same as [`access()`], but accepts expired access tokens and doesn't look
/// up their [`Session`]s, as the rotation checks the refresh token itself.
///
/// [`Session`]: service::domain::Session
///
/// # Errors
///
/// If the request cannot be authorized.
pub async fn refresh(
    Extension(service): Extension<Service>,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    fingerprint: Option<TypedHeader<Fingerprint>>,
    req: Request,
    next: Next,
) -> Result<Response, Error> {
    let device = DeviceHeaders::new(user_agent, fingerprint);
    authorize(&service, device, Scope::Refresh, req, next).await
}

/// Authorizes the provided request in the provided [`Scope`], and passes it
/// further with its [`Identity`].
async fn authorize(
    service: &Service,
    device: DeviceHeaders,
    scope: Scope,
    mut req: Request,
    next: Next,
) -> Result<Response, Error> {
    let token = bearer(req.headers())?;

    let identity = service
        .execute(command::AuthorizeUserSession {
            token,
            user_agent: device.user_agent,
            fingerprint: device.fingerprint,
            scope,
        })
        .await
        .map_err(AsError::into_error)?;

    drop(req.extensions_mut().insert(identity));
    Ok(next.run(req).await)
}

/// Extracts a [`session::AccessToken`] from the `Authorization` header.
///
/// The header must be exactly `Bearer <token>`, with the scheme spelled as
/// is and separated by a single space.
fn bearer(headers: &http::HeaderMap) -> Result<session::AccessToken, Error> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| Error::from(HeaderError::Missing))?
        .to_str()
        .map_err(|_| Error::from(HeaderError::Malformed))?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => {
            Ok(token.into())
        }
        _ => Err(HeaderError::Malformed.into()),
    }
}

define_error! {
    enum HeaderError {
        #[code = "MISSING_AUTHORIZATION_HEADER"]
        #[status = BAD_REQUEST]
        #[message = "`Authorization` header is missing"]
        Missing,

        #[code = "MALFORMED_AUTHORIZATION_HEADER"]
        #[status = BAD_REQUEST]
        #[message = "`Authorization` header must be `Bearer <token>`"]
        Malformed,
    }
}

define_error! {
    enum DeviceError {
        #[code = "MISSING_USER_AGENT"]
        #[status = BAD_REQUEST]
        #[message = "`User-Agent` header is missing"]
        MissingUserAgent,

        #[code = "MISSING_FINGERPRINT"]
        #[status = BAD_REQUEST]
        #[message = "`X-Fingerprint` header is missing"]
        MissingFingerprint,
    }
}

impl AsError for command::authorize_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Token(e) => return e.try_as_error(),
            Self::MissingUserAgent => DeviceError::MissingUserAgent.into(),
            Self::MissingFingerprint => DeviceError::MissingFingerprint.into(),
            Self::Session(e) => return e.try_as_error(),
        })
    }
}

impl AsError for token::Error {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_ACCESS_TOKEN"]
                #[status = UNAUTHORIZED]
                #[message = "Access token is invalid"]
                Invalid,

                #[code = "ACCESS_TOKEN_EXPIRED"]
                #[status = UNAUTHORIZED]
                #[message = "Access token is expired"]
                Expired,
            }
        }

        Some(match self {
            Self::InvalidSignature
            | Self::MalformedClaims(_)
            | Self::MalformedToken(_) => Error::Invalid.into(),
            Self::Expired => Error::Expired.into(),
            Self::Encode(_) => return None,
        })
    }
}

impl AsError for command::validate_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "UNKNOWN_ACCESS_TOKEN"]
                #[status = UNAUTHORIZED]
                #[message = "Access token is not the latest one of its \
                             `Session`, so the `Session` is revoked"]
                UnknownToken,

                #[code = "UNKNOWN_DEVICE"]
                #[status = UNAUTHORIZED]
                #[message = "Device differs from the one of the `Session`, \
                             so the `Session` is revoked"]
                UnknownDevice,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::NotFound(_) => api::session::SessionError::NotFound.into(),
            Self::UnknownToken => Error::UnknownToken.into(),
            Self::UnknownDevice => Error::UnknownDevice.into(),
        })
    }
}
