//! [`Command`] for revoking a single [`Session`].

use common::operations::{By, Delete};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::user::{session, Session},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for revoking a single [`Session`].
#[derive(Clone, Copy, Debug, From)]
pub struct DropUserSession {
    /// ID of the [`Session`] to revoke.
    pub session_id: session::Id,
}

impl<Db> Command<DropUserSession> for Service<Db>
where
    Db: Database<
        Delete<By<Session, session::Id>>,
        Ok = (),
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DropUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Delete(By::new(cmd.session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))
    }
}

/// Error of [`DropUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}
