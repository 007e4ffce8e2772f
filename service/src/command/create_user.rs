//! [`Command`] for creating a new [`User`].

use common::operations::Insert;
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Email, Name, Password};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// Name of the unique constraint on [`User`]'s email.
const EMAIL_KEY: &str = "users_email_key";

/// [`Command`] for creating a new [`User`].
#[derive(Debug)]
pub struct CreateUser {
    /// [`Email`] of a new [`User`].
    pub email: user::Email,

    /// [`Password`] of a new [`User`].
    pub password: SecretBox<user::Password>,

    /// [`Name`] of a new [`User`], if any.
    pub name: Option<user::Name>,
}

impl<Db> Command<CreateUser> for Service<Db>
where
    Db: Database<Insert<User>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            email,
            password,
            name,
        } = cmd;

        let password_hash = user::PasswordHash::new(password.expose_secret())
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let now = self.clock().now();
        let user = User {
            id: user::Id::new(),
            email,
            password_hash,
            name,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };

        // Uniqueness is left to the `Database`, so concurrent registrations
        // of the same email cannot both succeed.
        self.database()
            .execute(Insert(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map_err(|e| {
                if matches!(
                    e.as_ref(),
                    E::Db(db) if db.is_unique_violation(Some(EMAIL_KEY)),
                ) {
                    tracerr::new!(E::EmailOccupied(user.email.clone()))
                } else {
                    e
                }
            })?;

        Ok(user)
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`user::Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    #[from(ignore)]
    EmailOccupied(#[error(not(source))] user::Email),

    /// [`user::PasswordHash`] cannot be computed.
    #[display("Failed to hash a password: {_0}")]
    PasswordHash(#[error(not(source))] argon2::password_hash::Error),
}
