//! [`Command`] for rotating a [`Session`].

use common::operations::{By, Delete, Insert, Select, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::user::{self, session, Session},
    infra::{database, Database},
    token, Service,
};

use super::Command;

/// [`Command`] for redeeming a [`session::RefreshToken`] for a new
/// [`session::TokenPair`].
///
/// The redeemed [`Session`] is revoked whatever the outcome is, so a
/// [`session::RefreshToken`] can be redeemed at most once.
#[derive(Clone, Debug)]
pub struct RefreshUserSession {
    /// Presented [`session::RefreshToken`].
    pub refresh_token: session::RefreshToken,

    /// ID of the [`User`] the [`session::RefreshToken`] is presented by.
    pub user_id: user::Id,

    /// [`session::Device`] to bind a new [`Session`] to.
    pub device: session::Device,
}

impl<Db> Command<RefreshUserSession> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<Session>, &'l session::RefreshToken>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Session, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Insert<session::Draft>,
            Ok = (session::Id, session::RefreshToken),
            Err = Traced<database::Error>,
        > + Database<
            Update<(session::Id, session::AccessToken)>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
{
    type Ok = session::TokenPair;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RefreshUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RefreshUserSession {
            refresh_token,
            user_id,
            device,
        } = cmd;

        let session = self
            .database()
            .execute(Select(By::new(&refresh_token)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UnknownToken)
            .map_err(tracerr::wrap!())?;

        if let Err(e) = self
            .database()
            .execute(Delete(By::<Session, _>::new(session.id)))
            .await
        {
            log::error!(
                "failed to revoke redeemed `Session(id: {})`: {e}",
                session.id,
            );
        }

        if session.refresh_token != refresh_token || session.user_id != user_id
        {
            return Err(tracerr::new!(E::UnknownToken));
        }
        if session.is_expired_at(self.clock().now().coerce()) {
            return Err(tracerr::new!(E::ExpiredToken));
        }

        self.open_session(user_id, device).await
    }
}

/// Error of [`RefreshUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`token::Codec`] error.
    #[display("Failed to issue an access token: {_0}")]
    #[from]
    Token(token::Error),

    /// [`session::RefreshToken`] doesn't match any [`Session`].
    #[display("Unknown refresh token")]
    UnknownToken,

    /// [`Session`] of the [`session::RefreshToken`] is expired.
    #[display("Refresh token is expired")]
    ExpiredToken,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use crate::{
        command::{spec::*, RefreshUserSession},
        domain::user,
        Command as _,
    };

    use super::ExecutionError;

    #[tokio::test]
    async fn rotates_session() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let old = login(&svc, user_id, "UA1", "F1").await;

        let new = svc
            .execute(RefreshUserSession {
                refresh_token: old.refresh_token.clone(),
                user_id,
                device: device("UA1", "F1"),
            })
            .await
            .unwrap();

        assert_ne!(new.refresh_token, old.refresh_token);
        assert_ne!(new.access_token, old.access_token);
        let payload = svc.tokens().parse(&old.access_token).unwrap();
        assert!(find_session(&svc, payload.session_id).await.is_none());
    }

    #[tokio::test]
    async fn refresh_token_is_single_use() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;
        let refresh = || RefreshUserSession {
            refresh_token: pair.refresh_token.clone(),
            user_id,
            device: device("UA1", "F1"),
        };

        drop(svc.execute(refresh()).await.unwrap());
        let err = svc.execute(refresh()).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UnknownToken), "{err}");
    }

    #[tokio::test]
    async fn expired_session_is_rejected_and_revoked() {
        let (svc, clock) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;
        let payload = svc.tokens().parse(&pair.access_token).unwrap();

        clock.advance(REFRESH_TTL + Duration::from_secs(1));
        let err = svc
            .execute(RefreshUserSession {
                refresh_token: pair.refresh_token.clone(),
                user_id,
                device: device("UA1", "F1"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::ExpiredToken), "{err}");
        assert!(find_session(&svc, payload.session_id).await.is_none());
    }

    #[tokio::test]
    async fn session_is_alive_until_deadline() {
        let (svc, clock) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;

        clock.advance(REFRESH_TTL);

        assert!(svc
            .execute(RefreshUserSession {
                refresh_token: pair.refresh_token,
                user_id,
                device: device("UA1", "F1"),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn foreign_user_token_is_unknown_but_still_revoked() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;
        let payload = svc.tokens().parse(&pair.access_token).unwrap();

        let err = svc
            .execute(RefreshUserSession {
                refresh_token: pair.refresh_token,
                user_id: user::Id::new(),
                device: device("UA1", "F1"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UnknownToken), "{err}");
        assert!(find_session(&svc, payload.session_id).await.is_none());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;

        let err = svc
            .execute(RefreshUserSession {
                refresh_token: "never-issued".into(),
                user_id,
                device: device("UA1", "F1"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UnknownToken), "{err}");
    }
}
