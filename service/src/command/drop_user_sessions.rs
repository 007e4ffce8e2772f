//! [`Command`] for revoking multiple [`Session`]s of a [`User`].

use common::operations::{By, Delete, Select};
use derive_more::{Display, Error, From};
use serde::Serialize;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::user::{self, session, Session},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for revoking [`Session`]s of a [`User`] one by one.
///
/// Revokes every [`Session`] of the [`User`] if no [`session::Device`] is
/// specified, or only the ones bound to it otherwise.
#[derive(Clone, Debug)]
pub struct DropUserSessions {
    /// ID of the [`User`] whose [`Session`]s should be revoked.
    pub user_id: user::Id,

    /// [`session::Device`] to scope the revocation to, if any.
    pub device: Option<session::Device>,
}

/// Output of [`DropUserSessions`] [`Command`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Output {
    /// Number of revoked [`Session`]s.
    pub dropped: usize,

    /// Number of [`Session`]s failed to be revoked.
    pub failed: usize,
}

impl<Db> Command<DropUserSessions> for Service<Db>
where
    Db: Database<
            Select<By<Vec<Session>, user::Id>>,
            Ok = Vec<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Session>, (user::Id, session::Device)>>,
            Ok = Vec<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Session, session::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DropUserSessions,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DropUserSessions { user_id, device } = cmd;

        let sessions = if let Some(device) = device {
            self.database()
                .execute(Select(By::new((user_id, device))))
                .await
        } else {
            self.database().execute(Select(By::new(user_id))).await
        }
        .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let mut out = Output::default();
        for s in sessions {
            match self.database().execute(Delete(By::new(s.id))).await {
                Ok(()) => out.dropped += 1,
                Err(e) => {
                    out.failed += 1;
                    log::warn!(
                        "failed to revoke `Session(id: {})` of \
                         `User(id: {user_id})`: {e}",
                        s.id,
                    );
                }
            }
        }

        Ok(out)
    }
}

/// Error of [`DropUserSessions`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{spec::*, DropUserSessions},
        query, Query as _,
    };

    use super::Output;

    #[tokio::test]
    async fn drops_all_sessions_without_device() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        let other_id = register(&svc, "c@d.com").await;
        drop(login(&svc, user_id, "UA1", "F1").await);
        drop(login(&svc, user_id, "UA2", "F2").await);
        drop(login(&svc, other_id, "UA1", "F1").await);

        let out = svc
            .execute(DropUserSessions {
                user_id,
                device: None,
            })
            .await
            .unwrap();

        assert_eq!(out, Output { dropped: 2, failed: 0 });
        assert!(sessions_of(&svc, user_id).await.is_empty());
        assert_eq!(sessions_of(&svc, other_id).await.len(), 1);
    }

    #[tokio::test]
    async fn drops_only_sessions_of_device() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        drop(login(&svc, user_id, "UA1", "F1").await);
        drop(login(&svc, user_id, "UA1", "F2").await);

        let out = svc
            .execute(DropUserSessions {
                user_id,
                device: Some(device("UA1", "F1")),
            })
            .await
            .unwrap();

        assert_eq!(out, Output { dropped: 1, failed: 0 });
        let left = sessions_of(&svc, user_id).await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].user_agent.as_ref(), "UA1");
    }

    #[tokio::test]
    async fn continues_past_failures_and_counts_them() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        drop(login(&svc, user_id, "UA1", "F1").await);
        drop(login(&svc, user_id, "UA2", "F2").await);
        drop(login(&svc, user_id, "UA3", "F3").await);
        let stuck = sessions_of(&svc, user_id).await[1].id;
        svc.database().poison(stuck).await;

        let out = svc
            .execute(DropUserSessions {
                user_id,
                device: None,
            })
            .await
            .unwrap();

        assert_eq!(out, Output { dropped: 2, failed: 1 });
        let left = sessions_of(&svc, user_id).await;
        assert_eq!(left.iter().map(|s| s.id).collect::<Vec<_>>(), [stuck]);
    }

    async fn sessions_of(
        svc: &Service,
        user_id: crate::domain::user::Id,
    ) -> Vec<crate::read::session::Session> {
        svc.execute(query::sessions::ByUser {
            user_id,
            device: None,
        })
        .await
        .unwrap()
    }
}
