//! [`Command`] for authorizing a request by its [`Session`] token.

use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{Session, User};
use crate::{
    domain::user::{self, session},
    token, Service,
};

use super::{validate_user_session, Command, ValidateUserSession};

/// [`Command`] for authorizing a request bearing a [`session::AccessToken`].
#[derive(Clone, Debug)]
pub struct AuthorizeUserSession {
    /// Presented [`session::AccessToken`].
    pub token: session::AccessToken,

    /// [`session::UserAgent`] of the request, if any.
    pub user_agent: Option<session::UserAgent>,

    /// [`session::Fingerprint`] of the request, if any.
    pub fingerprint: Option<session::Fingerprint>,

    /// [`Scope`] to authorize the request in.
    pub scope: Scope,
}

/// Scope of an [`AuthorizeUserSession`] [`Command`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// Request to a protected resource.
    ///
    /// The [`session::AccessToken`] must be unexpired, and still be the
    /// latest one of its live [`Session`] on the same [`session::Device`].
    Access,

    /// Request to rotate a [`Session`].
    ///
    /// The [`session::AccessToken`] may be expired, and its [`Session`] is not
    /// looked up, as the rotation checks the [`session::RefreshToken`]
    /// itself.
    Refresh,
}

/// Identity of an authorized request.
#[derive(Clone, Debug)]
pub struct Identity {
    /// ID of the [`Session`] the request is authorized by.
    pub session_id: session::Id,

    /// ID of the [`User`] the request is authorized for.
    pub user_id: user::Id,

    /// [`session::Device`] the request is made from.
    pub device: session::Device,
}

impl<Db> Command<AuthorizeUserSession> for Service<Db>
where
    Self: Command<
        ValidateUserSession,
        Ok = session::Session,
        Err = Traced<validate_user_session::ExecutionError>,
    >,
{
    type Ok = Identity;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession {
            token,
            user_agent,
            fingerprint,
            scope,
        } = cmd;

        let payload = match scope {
            Scope::Access => self.tokens().parse_and_validate(&token),
            Scope::Refresh => self.tokens().parse(&token),
        }
        .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let device = session::Device {
            user_agent: user_agent
                .ok_or(E::MissingUserAgent)
                .map_err(tracerr::wrap!())?,
            fingerprint: fingerprint
                .ok_or(E::MissingFingerprint)
                .map_err(tracerr::wrap!())?,
        };

        if scope == Scope::Access {
            drop(
                self.execute(ValidateUserSession {
                    session_id: payload.session_id,
                    access_token: token,
                    device: device.clone(),
                })
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?,
            );
        }

        Ok(Identity {
            session_id: payload.session_id,
            user_id: payload.user_id,
            device,
        })
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`token::Codec`] rejected the [`session::AccessToken`].
    #[display("Invalid access token: {_0}")]
    #[from]
    Token(token::Error),

    /// `User-Agent` of the request is missing.
    #[display("`User-Agent` is missing")]
    MissingUserAgent,

    /// Fingerprint of the request is missing.
    #[display("Fingerprint is missing")]
    MissingFingerprint,

    /// [`Session`] of the [`session::AccessToken`] failed validation.
    #[display("{_0}")]
    #[from]
    Session(validate_user_session::ExecutionError),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use crate::{
        command::{spec::*, validate_user_session, AuthorizeUserSession},
        domain::user::session,
        token, Command as _,
    };

    use super::{ExecutionError, Scope};

    fn authorize(
        token: &session::AccessToken,
        ua: &str,
        fp: &str,
        scope: Scope,
    ) -> AuthorizeUserSession {
        AuthorizeUserSession {
            token: token.clone(),
            user_agent: session::UserAgent::new(ua),
            fingerprint: session::Fingerprint::new(fp),
            scope,
        }
    }

    #[tokio::test]
    async fn authorizes_live_session() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;

        let identity = svc
            .execute(authorize(&pair.access_token, "UA1", "F1", Scope::Access))
            .await
            .unwrap();

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.device, device("UA1", "F1"));
    }

    #[tokio::test]
    async fn rejects_expired_token_only_in_access_scope() {
        let (svc, clock) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;
        clock.advance(ACCESS_TTL + Duration::from_secs(1));

        let err = svc
            .execute(authorize(&pair.access_token, "UA1", "F1", Scope::Access))
            .await
            .unwrap_err();
        assert!(
            matches!(err.as_ref(), ExecutionError::Token(token::Error::Expired)),
            "{err}",
        );

        let identity = svc
            .execute(authorize(&pair.access_token, "UA1", "F1", Scope::Refresh))
            .await
            .unwrap();
        assert_eq!(identity.user_id, user_id);
    }

    #[tokio::test]
    async fn requires_device_headers() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;

        let err = svc
            .execute(authorize(&pair.access_token, "", "F1", Scope::Access))
            .await
            .unwrap_err();
        assert!(
            matches!(err.as_ref(), ExecutionError::MissingUserAgent),
            "{err}",
        );

        let err = svc
            .execute(authorize(&pair.access_token, "UA1", "", Scope::Refresh))
            .await
            .unwrap_err();
        assert!(
            matches!(err.as_ref(), ExecutionError::MissingFingerprint),
            "{err}",
        );
    }

    #[tokio::test]
    async fn device_mismatch_revokes_session() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;

        let err = svc
            .execute(authorize(&pair.access_token, "UA1", "F2", Scope::Access))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::Session(
                    validate_user_session::ExecutionError::UnknownDevice,
                ),
            ),
            "{err}",
        );

        let err = svc
            .execute(authorize(&pair.access_token, "UA1", "F1", Scope::Access))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::Session(
                    validate_user_session::ExecutionError::NotFound(_),
                ),
            ),
            "{err}",
        );
    }

    #[tokio::test]
    async fn rejects_foreign_signature_before_touching_sessions() {
        let (svc, _) = service();
        let (other, _) = service_with_secret("other-secret");
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;
        let forged = other
            .tokens()
            .generate(
                svc.tokens().parse(&pair.access_token).unwrap().session_id,
                user_id,
            )
            .unwrap();

        let err = svc
            .execute(authorize(&forged, "UA1", "F1", Scope::Access))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::Token(token::Error::InvalidSignature),
            ),
            "{err}",
        );

        assert!(svc
            .execute(authorize(&pair.access_token, "UA1", "F1", Scope::Access))
            .await
            .is_ok());
    }
}
