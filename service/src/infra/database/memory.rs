//! In-memory [`Database`] implementation.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use common::operations::{By, Delete, Insert, Select, Update};
use derive_more::{Display, Error as StdError};
use tokio::sync::RwLock;
use tracerr::Traced;
use uuid::Uuid;

#[cfg(doc)]
use crate::infra::Postgres;
use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
};

/// Name of the unique constraint on [`User`]'s email.
const USERS_EMAIL_KEY: &str = "users_email_key";

/// Name of the unique constraint on [`User`]'s ID.
const USERS_PKEY: &str = "users_pkey";

/// In-memory [`Database`] honoring the same contract as the [`Postgres`] one.
///
/// Every operation takes the lock once, so it's atomic on its own, while
/// sequences of operations are not.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<RwLock<State>>);

/// Contents of a [`Memory`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,

    /// Stored [`Session`]s.
    sessions: BTreeMap<session::Id, Session>,

    /// Last issued [`session::Id`].
    last_session_id: i64,

    /// [`Session`]s whose deletion fails.
    poisoned: HashSet<session::Id>,
}

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following deletion of the [`Session`] with the provided ID
    /// fail with an [`Error::Poisoned`].
    pub async fn poison(&self, id: session::Id) {
        _ = self.0.write().await.poisoned.insert(id);
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.read().await.users.get(by.key()).cloned())
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Email>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self
            .0
            .read()
            .await
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }
}

impl Database<Insert<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.0.write().await;
        if state.users.contains_key(&user.id) {
            return Err(tracerr::new!(Error::UniqueViolation(USERS_PKEY)))
                .map_err(tracerr::map_from);
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(tracerr::new!(Error::UniqueViolation(USERS_EMAIL_KEY)))
                .map_err(tracerr::map_from);
        }
        _ = state.users.insert(user.id, user);
        Ok(())
    }
}

impl Database<Update<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.0.write().await;
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(tracerr::new!(Error::UniqueViolation(USERS_EMAIL_KEY)))
                .map_err(tracerr::map_from);
        }
        if let Some(stored) = state.users.get_mut(&user.id) {
            let created_at = stored.created_at;
            *stored = User { created_at, ..user };
        }
        Ok(())
    }
}

impl Database<Insert<session::Draft>> for Memory {
    type Ok = (session::Id, session::RefreshToken);
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(draft): Insert<session::Draft>,
    ) -> Result<Self::Ok, Self::Err> {
        let session::Draft {
            user_id,
            device,
            expires_at,
            created_at,
        } = draft;

        let mut state = self.0.write().await;
        state.last_session_id += 1;
        let id = session::Id::from(state.last_session_id);
        let refresh_token =
            session::RefreshToken::from(Uuid::new_v4().to_string());

        _ = state.sessions.insert(
            id,
            Session {
                id,
                user_id,
                device,
                refresh_token: refresh_token.clone(),
                access_token: None,
                expires_at,
                created_at,
            },
        );
        Ok((id, refresh_token))
    }
}

impl Database<Select<By<Option<Session>, session::Id>>> for Memory {
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.read().await.sessions.get(by.key()).cloned())
    }
}

impl<'l> Database<Select<By<Option<Session>, &'l session::RefreshToken>>>
    for Memory
{
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, &'l session::RefreshToken>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();
        Ok(self
            .0
            .read()
            .await
            .sessions
            .values()
            .find(|s| &s.refresh_token == token)
            .cloned())
    }
}

impl Database<Select<By<Vec<Session>, user::Id>>> for Memory {
    type Ok = Vec<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Session>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();
        Ok(sorted(
            self.0
                .read()
                .await
                .sessions
                .values()
                .filter(|s| s.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }
}

impl Database<Select<By<Vec<Session>, (user::Id, session::Device)>>>
    for Memory
{
    type Ok = Vec<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Session>, (user::Id, session::Device)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (user_id, device) = by.into_inner();
        Ok(sorted(
            self.0
                .read()
                .await
                .sessions
                .values()
                .filter(|s| s.user_id == user_id && s.device == device)
                .cloned()
                .collect(),
        ))
    }
}

impl Database<Update<(session::Id, session::AccessToken)>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update((id, token)): Update<(session::Id, session::AccessToken)>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(s) = self.0.write().await.sessions.get_mut(&id) {
            s.access_token = Some(token);
        }
        Ok(())
    }
}

impl Database<Delete<By<Session, session::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let mut state = self.0.write().await;
        if state.poisoned.contains(&id) {
            return Err(tracerr::new!(Error::Poisoned(id)))
                .map_err(tracerr::map_from);
        }
        _ = state.sessions.remove(&id);
        Ok(())
    }
}

impl Database<Delete<By<Vec<Session>, user::Id>>> for Memory {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Vec<Session>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();

        let mut state = self.0.write().await;
        let ids = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect::<Vec<_>>();
        if let Some(id) = ids.iter().find(|id| state.poisoned.contains(id)) {
            return Err(tracerr::new!(Error::Poisoned(*id)))
                .map_err(tracerr::map_from);
        }

        let mut deleted = 0;
        for id in ids {
            if state.sessions.remove(&id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Orders the provided [`Session`]s from the oldest to the newest one.
fn sorted(mut sessions: Vec<Session>) -> Vec<Session> {
    sessions.sort_by_key(|s| (s.created_at, s.id));
    sessions
}

/// [`Memory`] database error.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// Deletion of the [`Session`] was made failing via [`Memory::poison()`].
    #[display("Deletion of `Session(id: {_0})` is poisoned")]
    Poisoned(#[error(not(source))] session::Id),

    /// Unique constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |exp| exp == *c),
            Self::Poisoned(_) => false,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Delete, Insert, Select, Update},
        DateTime,
    };

    use super::Memory;
    use crate::{
        domain::user::{self, session, Session},
        infra::Database,
    };

    fn draft(user_id: user::Id, fingerprint: &str) -> session::Draft {
        let now = DateTime::now();
        session::Draft {
            user_id,
            device: session::Device {
                user_agent: session::UserAgent::new("UA1").unwrap(),
                fingerprint: session::Fingerprint::new(fingerprint).unwrap(),
            },
            expires_at: (now + Duration::from_secs(60)).coerce(),
            created_at: now.coerce(),
        }
    }

    #[tokio::test]
    async fn issues_unique_ids_and_tokens() {
        let db = Memory::new();
        let user_id = user::Id::new();

        let (id1, token1) = db.execute(Insert(draft(user_id, "F1"))).await.unwrap();
        let (id2, token2) = db.execute(Insert(draft(user_id, "F1"))).await.unwrap();

        assert_ne!(id1, id2);
        assert_ne!(token1, token2);

        let found = db
            .execute(Select(By::<Option<Session>, _>::new(&token2)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id2);
        assert!(found.access_token.is_none());
    }

    #[tokio::test]
    async fn access_token_is_overwritten() {
        let db = Memory::new();
        let (id, _) =
            db.execute(Insert(draft(user::Id::new(), "F1"))).await.unwrap();

        db.execute(Update((id, session::AccessToken::from("first"))))
            .await
            .unwrap();
        db.execute(Update((id, session::AccessToken::from("second"))))
            .await
            .unwrap();

        let found = db
            .execute(Select(By::<Option<Session>, _>::new(id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.access_token, Some("second".into()));
    }

    #[tokio::test]
    async fn selects_by_device() {
        let db = Memory::new();
        let user_id = user::Id::new();
        let (id1, _) = db.execute(Insert(draft(user_id, "F1"))).await.unwrap();
        let (id2, _) = db.execute(Insert(draft(user_id, "F2"))).await.unwrap();
        drop(db.execute(Insert(draft(user::Id::new(), "F1"))).await.unwrap());

        let all = db
            .execute(Select(By::<Vec<Session>, _>::new(user_id)))
            .await
            .unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), [id1, id2]);

        let device = draft(user_id, "F2").device;
        let scoped = db
            .execute(Select(By::<Vec<Session>, _>::new((user_id, device))))
            .await
            .unwrap();
        assert_eq!(scoped.iter().map(|s| s.id).collect::<Vec<_>>(), [id2]);
    }

    #[tokio::test]
    async fn poisoned_deletion_fails() {
        let db = Memory::new();
        let user_id = user::Id::new();
        let (id, _) = db.execute(Insert(draft(user_id, "F1"))).await.unwrap();
        db.poison(id).await;

        assert!(db
            .execute(Delete(By::<Session, _>::new(id)))
            .await
            .is_err());
        assert!(db
            .execute(Delete(By::<Vec<Session>, _>::new(user_id)))
            .await
            .is_err());
        assert!(db
            .execute(Select(By::<Option<Session>, _>::new(id)))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn deletes_all_of_user() {
        let db = Memory::new();
        let user_id = user::Id::new();
        let other_id = user::Id::new();
        drop(db.execute(Insert(draft(user_id, "F1"))).await.unwrap());
        drop(db.execute(Insert(draft(user_id, "F2"))).await.unwrap());
        let (other, _) =
            db.execute(Insert(draft(other_id, "F1"))).await.unwrap();

        let deleted = db
            .execute(Delete(By::<Vec<Session>, _>::new(user_id)))
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert!(db
            .execute(Select(By::<Option<Session>, _>::new(other)))
            .await
            .unwrap()
            .is_some());
    }
}
