//! [`Storage`] definitions.

use common::operations::{By, Delete, Insert, Select, Update};
use derive_more::From;
use tracerr::Traced;

#[cfg(feature = "postgres")]
use super::Postgres;
use super::{Database, Error, Memory};
use crate::domain::{
    user::{self, session, Session},
    User,
};

/// [`Database`] picked at runtime.
#[derive(Clone, Debug, From)]
pub enum Storage {
    /// [`Postgres`] database.
    #[cfg(feature = "postgres")]
    Postgres(Postgres),

    /// [`Memory`] database.
    Memory(Memory),
}

/// Implements [`Database`] operations for [`Storage`] by delegating them to
/// the underlying backend.
macro_rules! delegate {
    ($( $( @$l:lifetime )? $op:ty => $ok:ty; )*) => {$(
        impl$( <$l> )? Database<$op> for Storage {
            type Ok = $ok;
            type Err = Traced<Error>;

            async fn execute(&self, op: $op) -> Result<Self::Ok, Self::Err> {
                match self {
                    #[cfg(feature = "postgres")]
                    Self::Postgres(db) => db.execute(op).await,
                    Self::Memory(db) => db.execute(op).await,
                }
            }
        }
    )*};
}

delegate! {
    Select<By<Option<User>, user::Id>> => Option<User>;
    @'l Select<By<Option<User>, &'l user::Email>> => Option<User>;
    Insert<User> => ();
    Update<User> => ();

    Insert<session::Draft> => (session::Id, session::RefreshToken);
    Select<By<Option<Session>, session::Id>> => Option<Session>;
    @'l Select<By<Option<Session>, &'l session::RefreshToken>>
        => Option<Session>;
    Select<By<Vec<Session>, user::Id>> => Vec<Session>;
    Select<By<Vec<Session>, (user::Id, session::Device)>> => Vec<Session>;
    Update<(session::Id, session::AccessToken)> => ();
    Delete<By<Session, session::Id>> => ();
    Delete<By<Vec<Session>, user::Id>> => u64;
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Delete, Insert, Select},
        DateTime,
    };

    use super::Storage;
    use crate::{
        domain::{
            user::{self, session, Email, Password, PasswordHash, Session},
            User,
        },
        infra::{Database, Memory},
    };

    #[tokio::test]
    async fn delegates_borrowing_lookups() {
        let db = Storage::from(Memory::new());
        let now = DateTime::now();
        let email = Email::new("a@b.com").unwrap();
        let user = User {
            id: user::Id::new(),
            email: email.clone(),
            password_hash: PasswordHash::new(
                &Password::new("Secret123").unwrap(),
            )
            .unwrap(),
            name: None,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };
        db.execute(Insert(user.clone())).await.unwrap();

        let found = db
            .execute(Select(By::<Option<User>, _>::new(&email)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);

        let (id, token) = db
            .execute(Insert(session::Draft {
                user_id: user.id,
                device: session::Device {
                    user_agent: session::UserAgent::new("UA1").unwrap(),
                    fingerprint: session::Fingerprint::new("F1").unwrap(),
                },
                expires_at: (now + Duration::from_secs(60)).coerce(),
                created_at: now.coerce(),
            }))
            .await
            .unwrap();
        let found = db
            .execute(Select(By::<Option<Session>, _>::new(&token)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);

        db.execute(Delete(By::<Session, _>::new(id))).await.unwrap();
        assert!(db
            .execute(Select(By::<Option<Session>, _>::new(&token)))
            .await
            .unwrap()
            .is_none());
    }
}
