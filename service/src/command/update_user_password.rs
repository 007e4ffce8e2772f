//! [`Command`] for updating an [`user::Password`].

use common::operations::{By, Delete, Select, Update};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::user::Password;
use crate::{
    domain::{user, Session, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for updating an [`user::Password`].
///
/// Revokes every [`Session`] of the [`User`] on success.
#[derive(Debug)]
pub struct UpdateUserPassword {
    /// ID of the [`User`] which [`Password`] should be updated.
    pub user_id: user::Id,

    /// New [`Password`] of the [`User`].
    pub new_password: SecretBox<user::Password>,

    /// Old [`Password`] of the [`User`].
    pub old_password: SecretBox<user::Password>,
}

impl<Db> Command<UpdateUserPassword> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Update<User>, Ok = (), Err = Traced<database::Error>>
        + Database<
            Delete<By<Vec<Session>, user::Id>>,
            Ok = u64,
            Err = Traced<database::Error>,
        >,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateUserPassword,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateUserPassword {
            user_id,
            new_password,
            old_password,
        } = cmd;

        let mut user = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(user_id))
            .map_err(tracerr::wrap!())?;
        if !user.password_hash.verify(old_password.expose_secret()) {
            return Err(tracerr::new!(E::WrongPassword));
        }

        user.password_hash =
            user::PasswordHash::new(new_password.expose_secret())
                .map_err(tracerr::from_and_wrap!(=> E))?;
        user.updated_at = self.clock().now().coerce();
        self.database()
            .execute(Update(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let revoked = self
            .database()
            .execute(Delete(By::<Vec<Session>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        log::info!(
            "password of `User(id: {user_id})` changed, revoked {revoked} \
             session(s)",
        );

        Ok(user)
    }
}

/// Error of [`UpdateUserPassword`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),

    /// Wrong old [`Password`] provided.
    #[display("Wrong old password")]
    WrongPassword,

    /// [`user::PasswordHash`] cannot be computed.
    #[display("Failed to hash a password: {_0}")]
    #[from]
    PasswordHash(#[error(not(source))] argon2::password_hash::Error),
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{
        command::{spec::*, UpdateUserPassword},
        domain::user,
        query, Command as _,
    };

    use super::ExecutionError;

    fn change(
        user_id: user::Id,
        old: &str,
        new: &str,
    ) -> UpdateUserPassword {
        UpdateUserPassword {
            user_id,
            new_password: SecretBox::new(Box::new(
                user::Password::new(new).unwrap(),
            )),
            old_password: SecretBox::new(Box::new(
                user::Password::new(old).unwrap(),
            )),
        }
    }

    #[tokio::test]
    async fn revokes_every_session() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        drop(login(&svc, user_id, "UA1", "F1").await);
        drop(login(&svc, user_id, "UA2", "F2").await);

        let user = svc
            .execute(change(user_id, "Secret123", "Secret456"))
            .await
            .unwrap();

        assert!(user
            .password_hash
            .verify(&user::Password::new("Secret456").unwrap()));
        let left = svc
            .execute(query::sessions::ByUser {
                user_id,
                device: None,
            })
            .await
            .unwrap();
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn rejects_wrong_old_password() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;
        drop(login(&svc, user_id, "UA1", "F1").await);

        let err = svc
            .execute(change(user_id, "Wrong1234", "Secret456"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongPassword), "{err}");
    }
}
