//! [`Query`] collection related to multiple [`Session`]s.

use common::operations::{By, Select};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::user::{self, session, Session},
    infra::{database, Database},
    read, Query, Service,
};

/// Queries [`read::session::Session`]s of a [`User`], optionally scoped to a
/// single [`session::Device`].
#[derive(Clone, Debug)]
pub struct ByUser {
    /// ID of the [`User`] whose [`Session`]s are queried.
    pub user_id: user::Id,

    /// [`session::Device`] to scope the [`Session`]s to, if any.
    pub device: Option<session::Device>,
}

impl<Db> Query<ByUser> for Service<Db>
where
    Db: Database<
            Select<By<Vec<Session>, user::Id>>,
            Ok = Vec<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Session>, (user::Id, session::Device)>>,
            Ok = Vec<Session>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Vec<read::session::Session>;
    type Err = Traced<database::Error>;

    async fn execute(&self, query: ByUser) -> Result<Self::Ok, Self::Err> {
        let ByUser { user_id, device } = query;

        let sessions = if let Some(device) = device {
            self.database()
                .execute(Select(By::new((user_id, device))))
                .await
        } else {
            self.database().execute(Select(By::new(user_id))).await
        }
        .map_err(tracerr::wrap!())?;

        Ok(sessions.into_iter().map(Into::into).collect())
    }
}
