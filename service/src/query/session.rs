//! [`Query`] collection related to a single [`Session`].

use common::operations::{By, Select};
use derive_more::From;
use tracerr::Traced;

use crate::{
    domain::user::{session, Session},
    infra::{database, Database},
    read, Query, Service,
};

/// Queries a [`read::session::Session`] by its [`session::Id`].
#[derive(Clone, Copy, Debug, From)]
pub struct ById(pub session::Id);

impl<Db> Query<ById> for Service<Db>
where
    Db: Database<
        Select<By<Option<Session>, session::Id>>,
        Ok = Option<Session>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<read::session::Session>;
    type Err = Traced<database::Error>;

    async fn execute(&self, ById(id): ById) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .database()
            .execute(Select(By::new(id)))
            .await
            .map_err(tracerr::wrap!())?
            .map(Into::into))
    }
}
