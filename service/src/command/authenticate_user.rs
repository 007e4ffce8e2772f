//! [`Command`] for authenticating a [`User`] by credentials.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Email, Password};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authenticating a [`User`] by its [`Email`] and
/// [`Password`].
#[derive(Debug)]
pub struct AuthenticateUser {
    /// [`Email`] of the [`User`].
    pub email: user::Email,

    /// [`Password`] of the [`User`].
    pub password: SecretBox<user::Password>,
}

impl<Db> Command<AuthenticateUser> for Service<Db>
where
    Db: for<'l> Database<
        Select<By<Option<User>, &'l user::Email>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthenticateUser,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthenticateUser { email, password } = cmd;

        let user = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::WrongCredentials)
            .map_err(tracerr::wrap!())?;

        if !user.password_hash.verify(password.expose_secret()) {
            return Err(tracerr::new!(E::WrongCredentials));
        }

        Ok(user)
    }
}

/// Error of [`AuthenticateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// No [`User`] matches the provided credentials.
    #[display("Wrong `User` credentials")]
    WrongCredentials,
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{
        command::{spec::*, AuthenticateUser},
        domain::user,
        Command as _,
    };

    use super::ExecutionError;

    fn credentials(email: &str, password: &str) -> AuthenticateUser {
        AuthenticateUser {
            email: user::Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(
                user::Password::new(password).unwrap(),
            )),
        }
    }

    #[tokio::test]
    async fn accepts_valid_credentials() {
        let (svc, _) = service();
        let user_id = register(&svc, "a@b.com").await;

        let user = svc
            .execute(credentials("a@b.com", "Secret123"))
            .await
            .unwrap();

        assert_eq!(user.id, user_id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let (svc, _) = service();
        drop(register(&svc, "a@b.com").await);

        for (email, password) in
            [("a@b.com", "Secret124"), ("c@d.com", "Secret123")]
        {
            let err = svc
                .execute(credentials(email, password))
                .await
                .unwrap_err();
            assert!(
                matches!(err.as_ref(), ExecutionError::WrongCredentials),
                "{err}",
            );
        }
    }
}
