//! Codec of signed [`AccessToken`]s.

use std::time::Duration;

use common::{unit, Clock, DateTimeOf};
use derive_more::{Debug, Display, Error as StdError};
use jsonwebtoken::{
    errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::Session;
use crate::{
    domain::user::{self, session, session::AccessToken},
    Config,
};

/// [`Codec`] signing and verifying [`AccessToken`]s with [HS256].
///
/// Stateless apart from the shared secret, the issuer, the configured TTL and
/// the [`Clock`] it reads the current time from.
///
/// [HS256]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.2
#[derive(Clone, Debug)]
pub struct Codec {
    /// Key to sign [`AccessToken`]s with.
    #[debug(skip)]
    encoding_key: EncodingKey,

    /// Key to verify [`AccessToken`]s with.
    #[debug(skip)]
    decoding_key: DecodingKey,

    /// [`Validation`] applied to every decoded [`AccessToken`].
    #[debug(skip)]
    validation: Validation,

    /// Issuer stamped into every [`AccessToken`].
    issuer: String,

    /// Lifetime of an issued [`AccessToken`].
    ttl: Duration,

    /// [`Clock`] to read the current time from.
    clock: Clock,
}

impl Codec {
    /// Creates a new [`Codec`] out of the provided [`Config`].
    #[must_use]
    pub fn new(config: &Config, clock: Clock) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the `Clock` instead.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        _ = validation.required_spec_claims.insert("iss".to_owned());
        validation.set_issuer(&[&config.jwt_issuer]);

        Self {
            encoding_key: config.jwt_encoding_key.clone(),
            decoding_key: config.jwt_decoding_key.clone(),
            validation,
            issuer: config.jwt_issuer.clone(),
            ttl: config.access_token_ttl,
            clock,
        }
    }

    /// Issues a new [`AccessToken`] for the provided [`Session`].
    ///
    /// # Errors
    ///
    /// If the token cannot be signed.
    pub fn generate(
        &self,
        session_id: session::Id,
        user_id: user::Id,
    ) -> Result<AccessToken, Traced<Error>> {
        let now = self.clock.now();
        let claims = Claims {
            jti: Some(session_id.to_string()),
            sub: Some(user_id.to_string()),
            iss: Some(self.issuer.clone()),
            iat: Some(now.unix_timestamp()),
            exp: Some((now + self.ttl).unix_timestamp()),
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )
        .map(AccessToken::from)
        .map_err(|e| tracerr::new!(Error::Encode(e)))
    }

    /// Verifies the provided [`AccessToken`] and its expiry.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSignature`] if the signature or algorithm mismatch.
    /// - [`Error::Expired`] if the token is past its expiry.
    /// - [`Error::MalformedClaims`] if any required claim is missing or
    ///   invalid.
    /// - [`Error::MalformedToken`] if the token cannot be decoded at all.
    pub fn parse_and_validate(
        &self,
        token: &AccessToken,
    ) -> Result<Payload, Traced<Error>> {
        let payload = self.parse(token)?;
        let now: ExpirationDateTime = self.clock.now().coerce();
        if now >= payload.expires_at {
            return Err(tracerr::new!(Error::Expired));
        }
        Ok(payload)
    }

    /// Verifies the provided [`AccessToken`] without checking its expiry.
    ///
    /// # Errors
    ///
    /// Same as [`Codec::parse_and_validate()`], except [`Error::Expired`].
    pub fn parse(&self, token: &AccessToken) -> Result<Payload, Traced<Error>> {
        let Claims { jti, sub, exp, .. } = jsonwebtoken::decode::<Claims>(
            token.as_ref(),
            &self.decoding_key,
            &self.validation,
        )
        .map_err(tracerr::from_and_wrap!(=> Error))?
        .claims;

        let session_id = jti
            .ok_or(Error::MalformedClaims("missing `jti` claim"))
            .and_then(|jti| {
                jti.parse().map_err(|_| {
                    Error::MalformedClaims("`jti` claim is not a session ID")
                })
            })
            .map_err(tracerr::wrap!())?;
        let user_id = sub
            .ok_or(Error::MalformedClaims("missing `sub` claim"))
            .and_then(|sub| {
                sub.parse().map_err(|_| {
                    Error::MalformedClaims("`sub` claim is not a user ID")
                })
            })
            .map_err(tracerr::wrap!())?;
        let expires_at = exp
            .and_then(DateTimeOf::from_unix_timestamp)
            .ok_or(Error::MalformedClaims("missing or invalid `exp` claim"))
            .map_err(tracerr::wrap!())?;

        Ok(Payload {
            session_id,
            user_id,
            expires_at,
        })
    }
}

/// Registered claims of an [`AccessToken`].
///
/// All of them are optional on decoding, so missing ones are reported as
/// [`Error::MalformedClaims`] rather than an opaque decoding failure.
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    /// ID of the [`Session`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,

    /// ID of the [`User`](crate::domain::User).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,

    /// Issuer of the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,

    /// Unix timestamp of the token issuing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,

    /// Unix timestamp of the token expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

/// Verified contents of an [`AccessToken`].
#[derive(Clone, Copy, Debug)]
pub struct Payload {
    /// ID of the [`Session`] the token was issued for.
    pub session_id: session::Id,

    /// ID of the [`User`](crate::domain::User) the token was issued for.
    pub user_id: user::Id,

    /// [`DateTimeOf`] when the token expires.
    pub expires_at: ExpirationDateTime,
}

/// [`DateTimeOf`] when an [`AccessToken`] expires.
pub type ExpirationDateTime = DateTimeOf<(AccessToken, unit::Expiration)>;

/// Error of [`Codec`] operations.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// Signature or algorithm of the token mismatch.
    #[display("Token signature is invalid")]
    InvalidSignature,

    /// Token is past its expiry.
    #[display("Token is expired")]
    Expired,

    /// Token claims are missing or invalid.
    #[display("Token claims are malformed: {_0}")]
    MalformedClaims(#[error(not(source))] &'static str),

    /// Token cannot be decoded.
    #[display("Token is malformed: {_0}")]
    MalformedToken(jsonwebtoken::errors::Error),

    /// Token cannot be signed.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    Encode(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let kind = err.kind();
        if matches!(
            kind,
            ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidKeyFormat
        ) {
            Self::InvalidSignature
        } else if matches!(kind, ErrorKind::InvalidIssuer) {
            Self::MalformedClaims("`iss` claim mismatch")
        } else if matches!(kind, ErrorKind::MissingRequiredClaim(_)) {
            Self::MalformedClaims("required claim is missing")
        } else {
            Self::MalformedToken(err)
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{Clock, DateTime};
    use jsonwebtoken::{Algorithm, EncodingKey, Header};

    use super::{Claims, Codec, Error};
    use crate::{
        domain::user::{self, session},
        Config,
    };

    fn config(secret: &str) -> Config {
        Config::new(
            secret,
            "auth-test",
            Duration::from_secs(15 * 60),
            Duration::from_secs(30 * 24 * 60 * 60),
        )
    }

    fn codec() -> (Codec, Clock) {
        let clock =
            Clock::manual(DateTime::from_unix_timestamp(1_700_000_000).unwrap());
        (Codec::new(&config("secret"), clock.clone()), clock)
    }

    fn sign(claims: &Claims, secret: &str) -> session::AccessToken {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn generated_token_carries_session_and_user() {
        let (codec, _) = codec();
        let user_id = user::Id::new();

        let token = codec.generate(session::Id::from(42), user_id).unwrap();
        let payload = codec.parse_and_validate(&token).unwrap();

        assert_eq!(payload.session_id, session::Id::from(42));
        assert_eq!(payload.user_id, user_id);
        assert_eq!(payload.expires_at.unix_timestamp(), 1_700_000_000 + 900);
    }

    #[test]
    fn expired_token_is_only_parsed() {
        let (codec, clock) = codec();
        let token = codec.generate(session::Id::from(1), user::Id::new()).unwrap();

        clock.advance(Duration::from_secs(15 * 60));

        let err = codec.parse_and_validate(&token).unwrap_err();
        assert!(matches!(err.as_ref(), Error::Expired), "{err}");
        assert!(codec.parse(&token).is_ok());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let (codec, clock) = codec();
        let foreign = Codec::new(&config("other"), clock);
        let token =
            foreign.generate(session::Id::from(1), user::Id::new()).unwrap();

        let err = codec.parse(&token).unwrap_err();
        assert!(matches!(err.as_ref(), Error::InvalidSignature), "{err}");
    }

    #[test]
    fn foreign_algorithm_is_rejected() {
        let (codec, _) = codec();
        let claims = Claims {
            jti: Some("1".into()),
            sub: Some(user::Id::new().to_string()),
            iss: Some("auth-test".into()),
            iat: None,
            exp: Some(1_800_000_000),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
        .into();

        let err = codec.parse(&token).unwrap_err();
        assert!(matches!(err.as_ref(), Error::InvalidSignature), "{err}");
    }

    #[test]
    fn missing_or_invalid_claims_are_malformed() {
        let (codec, _) = codec();
        let valid = Claims {
            jti: Some("7".into()),
            sub: Some(user::Id::new().to_string()),
            iss: Some("auth-test".into()),
            iat: None,
            exp: Some(1_800_000_000),
        };

        for claims in [
            Claims { jti: None, ..clone(&valid) },
            Claims { jti: Some("seven".into()), ..clone(&valid) },
            Claims { sub: None, ..clone(&valid) },
            Claims { sub: Some("nobody".into()), ..clone(&valid) },
            Claims { exp: None, ..clone(&valid) },
            Claims { iss: Some("stranger".into()), ..clone(&valid) },
            Claims { iss: None, ..clone(&valid) },
        ] {
            let err = codec.parse(&sign(&claims, "secret")).unwrap_err();
            assert!(matches!(err.as_ref(), Error::MalformedClaims(_)), "{err}");
        }

        assert!(codec.parse(&sign(&valid, "secret")).is_ok());
    }

    #[test]
    fn garbage_is_malformed() {
        let (codec, _) = codec();

        let err = codec.parse(&"not.a.token".into()).unwrap_err();
        assert!(matches!(err.as_ref(), Error::MalformedToken(_)), "{err}");
    }

    fn clone(claims: &Claims) -> Claims {
        Claims {
            jti: claims.jti.clone(),
            sub: claims.sub.clone(),
            iss: claims.iss.clone(),
            iat: claims.iat,
            exp: claims.exp,
        }
    }
}
