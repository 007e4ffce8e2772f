//! [`Command`] for creating a [`Session`].

use common::operations::{Insert, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{user::session::AccessToken, Session, User};
use crate::{
    domain::user::{self, session},
    infra::{database, Database},
    token, Service,
};

use super::{drop_user_sessions, Command, DropUserSessions};

/// [`Command`] for creating a [`Session`] of an authenticated [`User`] on a
/// [`session::Device`].
///
/// Any other [`Session`]s of the [`User`] on the same [`session::Device`] are
/// revoked beforehand, on a best-effort basis.
#[derive(Clone, Debug)]
pub struct CreateUserSession {
    /// ID of the [`User`] to create a [`Session`] for.
    pub user_id: user::Id,

    /// [`session::Device`] to bind a new [`Session`] to.
    pub device: session::Device,
}

impl<Db> Command<CreateUserSession> for Service<Db>
where
    Db: Database<
            Insert<session::Draft>,
            Ok = (session::Id, session::RefreshToken),
            Err = Traced<database::Error>,
        > + Database<
            Update<(session::Id, session::AccessToken)>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
    Self: Command<
        DropUserSessions,
        Ok = drop_user_sessions::Output,
        Err = Traced<drop_user_sessions::ExecutionError>,
    >,
{
    type Ok = session::TokenPair;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        let CreateUserSession { user_id, device } = cmd;

        match self
            .execute(DropUserSessions {
                user_id,
                device: Some(device.clone()),
            })
            .await
        {
            Ok(out) if out.failed > 0 => log::warn!(
                "failed to revoke {} of {} previous `Session`(s) of \
                 `User(id: {user_id})` on the same device",
                out.failed,
                out.failed + out.dropped,
            ),
            Ok(_) => {}
            Err(e) => log::warn!(
                "failed to revoke previous `Session`s of \
                 `User(id: {user_id})` on the same device: {e}",
            ),
        }

        self.open_session(user_id, device).await
    }
}

impl<Db> Service<Db>
where
    Db: Database<
            Insert<session::Draft>,
            Ok = (session::Id, session::RefreshToken),
            Err = Traced<database::Error>,
        > + Database<
            Update<(session::Id, session::AccessToken)>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
{
    /// Opens a new [`Session`] and issues its [`session::TokenPair`].
    ///
    /// The issued [`AccessToken`] is stored along the [`Session`], so that
    /// only the latest one is accepted.
    pub(crate) async fn open_session<E>(
        &self,
        user_id: user::Id,
        device: session::Device,
    ) -> Result<session::TokenPair, Traced<E>>
    where
        E: From<database::Error> + From<token::Error>,
    {
        let now = self.clock().now();
        let (session_id, refresh_token) = self
            .database()
            .execute(Insert(session::Draft {
                user_id,
                device,
                expires_at: (now + self.config().refresh_token_ttl).coerce(),
                created_at: now.coerce(),
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let access_token = self
            .tokens()
            .generate(session_id, user_id)
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        self.database()
            .execute(Update((session_id, access_token.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        log::debug!(
            "opened `Session(id: {session_id})` of `User(id: {user_id})`",
        );

        Ok(session::TokenPair {
            access_token,
            refresh_token,
        })
    }
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`token::Codec`] error.
    #[display("Failed to issue an access token: {_0}")]
    Token(token::Error),
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        command::{spec::*, CreateUserSession},
        domain::user::{session, Session},
        infra::Database,
        Command,
    };

    #[tokio::test]
    async fn refresh_token_resolves_to_session_on_callers_device() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;

        let pair = svc
            .execute(CreateUserSession {
                user_id,
                device: device("UA1", "F1"),
            })
            .await
            .unwrap();

        let session = svc
            .database()
            .execute(Select(By::<Option<Session>, _>::new(&pair.refresh_token)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.device, device("UA1", "F1"));
        assert_eq!(session.access_token, Some(pair.access_token.clone()));

        let payload = svc.tokens().parse_and_validate(&pair.access_token).unwrap();
        assert_eq!(payload.session_id, session.id);
        assert_eq!(payload.user_id, user_id);
    }

    #[tokio::test]
    async fn same_device_login_revokes_previous_session() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;

        let first = login(&svc, user_id, "UA1", "F1").await;
        let second = login(&svc, user_id, "UA1", "F1").await;

        assert!(find_by_token(&svc, &first.refresh_token).await.is_none());
        assert!(find_by_token(&svc, &second.refresh_token).await.is_some());
    }

    #[tokio::test]
    async fn new_device_login_keeps_other_sessions() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;

        let old = login(&svc, user_id, "UA1", "F1").await;
        let new = login(&svc, user_id, "UA1", "F2").await;

        assert!(find_by_token(&svc, &old.refresh_token).await.is_some());
        assert!(find_by_token(&svc, &new.refresh_token).await.is_some());
    }

    #[tokio::test]
    async fn failed_revocation_does_not_block_login() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let old = login(&svc, user_id, "UA1", "F1").await;
        let old_id = find_by_token(&svc, &old.refresh_token).await.unwrap().id;
        svc.database().poison(old_id).await;

        let new = login(&svc, user_id, "UA1", "F1").await;

        assert!(find_by_token(&svc, &new.refresh_token).await.is_some());
        assert!(find_by_token(&svc, &old.refresh_token).await.is_some());
    }

    async fn find_by_token(
        svc: &Service,
        token: &session::RefreshToken,
    ) -> Option<Session> {
        svc.database()
            .execute(Select(By::<Option<Session>, _>::new(token)))
            .await
            .unwrap()
    }
}
