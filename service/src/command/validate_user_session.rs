//! [`Command`] for validating a [`Session`].

use common::operations::{By, Delete, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::user::{session, Session},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for checking that the presented [`session::AccessToken`] is the
/// latest one issued for its [`Session`], and that it's presented from the
/// [`session::Device`] the [`Session`] is bound to.
///
/// A [`Session`] failing either check is revoked, as its tokens are
/// considered compromised.
#[derive(Clone, Debug)]
pub struct ValidateUserSession {
    /// ID of the [`Session`] to validate.
    pub session_id: session::Id,

    /// Presented [`session::AccessToken`].
    pub access_token: session::AccessToken,

    /// [`session::Device`] the [`session::AccessToken`] is presented from.
    pub device: session::Device,
}

impl<Db> Command<ValidateUserSession> for Service<Db>
where
    Db: Database<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Session, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ValidateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ValidateUserSession {
            session_id,
            access_token,
            device,
        } = cmd;

        let session = self
            .database()
            .execute(Select(By::new(session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NotFound(session_id))
            .map_err(tracerr::wrap!())?;

        let err = if session.access_token.as_ref() != Some(&access_token) {
            E::UnknownToken
        } else if session.device != device {
            E::UnknownDevice
        } else {
            return Ok(session);
        };

        log::warn!("revoking `Session(id: {session_id})`: {err}");
        self.database()
            .execute(Delete(By::<Session, _>::new(session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Err(tracerr::new!(err))
    }
}

/// Error of [`ValidateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Session`] doesn't exist.
    #[display("`Session(id: {_0})` does not exist")]
    NotFound(#[error(not(source))] session::Id),

    /// [`session::AccessToken`] is not the latest one of its [`Session`].
    #[display("Access token is not the latest one of its `Session`")]
    UnknownToken,

    /// [`session::Device`] differs from the one of the [`Session`].
    #[display("Device differs from the one of the `Session`")]
    UnknownDevice,
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{spec::*, ValidateUserSession},
        domain::user::session,
        Command as _,
    };

    use super::ExecutionError;

    async fn validate(
        svc: &Service,
        pair: &session::TokenPair,
        access_token: session::AccessToken,
        device: session::Device,
    ) -> Result<session::Session, tracerr::Traced<ExecutionError>> {
        let session_id = svc.tokens().parse(&pair.access_token).unwrap().session_id;
        svc.execute(ValidateUserSession {
            session_id,
            access_token,
            device,
        })
        .await
    }

    #[tokio::test]
    async fn accepts_latest_token_on_same_device() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;

        let session = validate(
            &svc,
            &pair,
            pair.access_token.clone(),
            device("UA1", "F1"),
        )
        .await
        .unwrap();

        assert_eq!(session.user_id, user_id);
        assert!(find_session(&svc, session.id).await.is_some());
    }

    #[tokio::test]
    async fn other_fingerprint_revokes_session() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;

        let err = validate(
            &svc,
            &pair,
            pair.access_token.clone(),
            device("UA1", "F2"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::UnknownDevice), "{err}");

        let err = validate(
            &svc,
            &pair,
            pair.access_token.clone(),
            device("UA1", "F1"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotFound(_)), "{err}");
    }

    #[tokio::test]
    async fn stale_token_revokes_session() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let pair = login(&svc, user_id, "UA1", "F1").await;

        let err = validate(&svc, &pair, "forged".into(), device("UA1", "F1"))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::UnknownToken), "{err}");

        let session_id =
            svc.tokens().parse(&pair.access_token).unwrap().session_id;
        assert!(find_session(&svc, session_id).await.is_none());
    }
}
