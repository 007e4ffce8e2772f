//! [`Session`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::user::{self, session, Session},
    infra::{database, Database, Postgres},
};

use super::FromRow;

/// Columns of a [`Session`] in the `refresh_sessions` table.
const COLUMNS: &str = "\
    session_id, user_id, user_agent, fingerprint, \
    refresh_token, access_token, expires_at, created_at";

impl FromRow for Session {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("session_id"),
            user_id: row.get("user_id"),
            device: session::Device {
                user_agent: row.get("user_agent"),
                fingerprint: row.get("fingerprint"),
            },
            refresh_token: row.get("refresh_token"),
            access_token: row.get("access_token"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }
    }
}

impl Database<Insert<session::Draft>> for Postgres {
    type Ok = (session::Id, session::RefreshToken);
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(draft): Insert<session::Draft>,
    ) -> Result<Self::Ok, Self::Err> {
        let session::Draft {
            user_id,
            device:
                session::Device {
                    user_agent,
                    fingerprint,
                },
            expires_at,
            created_at,
        } = draft;

        // `session_id` and `refresh_token` are generated by the table.
        const SQL: &str = "\
            INSERT INTO refresh_sessions (\
                user_id, user_agent, fingerprint, expires_at, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, $3::VARCHAR, \
                $4::TIMESTAMPTZ, $5::TIMESTAMPTZ\
            ) \
            RETURNING session_id, refresh_token";
        let row = self
            .query_one(
                SQL,
                &[
                    &user_id,
                    &user_agent,
                    &fingerprint,
                    &expires_at,
                    &created_at,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;

        Ok((row.get("session_id"), row.get("refresh_token")))
    }
}

impl Database<Select<By<Option<Session>, session::Id>>> for Postgres {
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM refresh_sessions \
             WHERE session_id = $1::INT8",
        );
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(Session::from_row))
    }
}

impl<'l> Database<Select<By<Option<Session>, &'l session::RefreshToken>>>
    for Postgres
{
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, &'l session::RefreshToken>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM refresh_sessions \
             WHERE refresh_token = $1::VARCHAR",
        );
        Ok(self
            .query_opt(&sql, &[&token])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(Session::from_row))
    }
}

impl Database<Select<By<Vec<Session>, user::Id>>> for Postgres {
    type Ok = Vec<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Session>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM refresh_sessions \
             WHERE user_id = $1::UUID \
             ORDER BY created_at, session_id",
        );
        Ok(self
            .query(&sql, &[&user_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(Session::from_row)
            .collect())
    }
}

impl Database<Select<By<Vec<Session>, (user::Id, session::Device)>>>
    for Postgres
{
    type Ok = Vec<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Session>, (user::Id, session::Device)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (
            user_id,
            session::Device {
                user_agent,
                fingerprint,
            },
        ) = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM refresh_sessions \
             WHERE user_id = $1::UUID \
               AND user_agent = $2::VARCHAR \
               AND fingerprint = $3::VARCHAR \
             ORDER BY created_at, session_id",
        );
        Ok(self
            .query(&sql, &[&user_id, &user_agent, &fingerprint])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(Session::from_row)
            .collect())
    }
}

impl Database<Update<(session::Id, session::AccessToken)>> for Postgres {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update((id, token)): Update<(session::Id, session::AccessToken)>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE refresh_sessions \
            SET access_token = $2::VARCHAR \
            WHERE session_id = $1::INT8";
        self.exec(SQL, &[&id, &token])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl Database<Delete<By<Session, session::Id>>> for Postgres {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM refresh_sessions \
            WHERE session_id = $1::INT8";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl Database<Delete<By<Vec<Session>, user::Id>>> for Postgres {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Vec<Session>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();

        const SQL: &str = "\
            DELETE FROM refresh_sessions \
            WHERE user_id = $1::UUID";
        self.exec(SQL, &[&user_id]).await.map_err(tracerr::wrap!())
    }
}
