//! [`Session`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Debug, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::User;
use crate::domain::user;

/// Refresh session of a [`User`] bound to a single [`Device`].
///
/// Holds the refresh token redeemable exactly once, and the last access token
/// issued for it, which is the only one accepted afterwards.
#[derive(Clone, Debug)]
pub struct Session {
    /// ID of this [`Session`].
    pub id: Id,

    /// ID of the [`User`] this [`Session`] belongs to.
    pub user_id: user::Id,

    /// [`Device`] this [`Session`] is bound to.
    pub device: Device,

    /// [`RefreshToken`] of this [`Session`].
    pub refresh_token: RefreshToken,

    /// Last [`AccessToken`] issued for this [`Session`].
    ///
    /// [`None`] only between the creation of this [`Session`] and the first
    /// issued [`AccessToken`].
    pub access_token: Option<AccessToken>,

    /// [`DateTime`] when this [`Session`] expires.
    pub expires_at: ExpirationDateTime,

    /// [`DateTime`] when this [`Session`] was created.
    pub created_at: CreationDateTime,
}

impl Session {
    /// Indicates whether this [`Session`] is expired at the provided moment.
    #[must_use]
    pub fn is_expired_at(&self, now: ExpirationDateTime) -> bool {
        now > self.expires_at
    }
}

/// Not yet persisted [`Session`].
///
/// Its [`Id`] and [`RefreshToken`] are issued by the store on insertion.
#[derive(Clone, Debug)]
pub struct Draft {
    /// ID of the [`User`] a new [`Session`] belongs to.
    pub user_id: user::Id,

    /// [`Device`] a new [`Session`] is bound to.
    pub device: Device,

    /// [`DateTime`] when a new [`Session`] expires.
    pub expires_at: ExpirationDateTime,

    /// [`DateTime`] when a new [`Session`] is created.
    pub created_at: CreationDateTime,
}

/// ID of a [`Session`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(i64);

/// Coarse identity of a client device.
///
/// Supplied by the client, so it's never trusted beyond matching against the
/// one a [`Session`] was created with.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Device {
    /// [`UserAgent`] of this [`Device`].
    pub user_agent: UserAgent,

    /// [`Fingerprint`] of this [`Device`].
    pub fingerprint: Fingerprint,
}

/// `User-Agent` reported by a client.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct UserAgent(String);

impl UserAgent {
    /// Creates a new [`UserAgent`] if the given `value` is not empty.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        (!value.is_empty()).then_some(Self(value))
    }
}

/// Opaque fingerprint reported by a client.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Creates a new [`Fingerprint`] if the given `value` is not empty.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        (!value.is_empty()).then_some(Self(value))
    }
}

/// Opaque secret redeemable once for a new [`TokenPair`].
#[derive(AsRef, Clone, Debug, Eq, From, Hash, PartialEq, Serialize)]
#[as_ref(str)]
#[debug("RefreshToken(***)")]
#[from(String, &str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct RefreshToken(String);

/// Short-lived signed token proving an active [`Session`].
#[derive(AsRef, Clone, Debug, Eq, From, PartialEq, Serialize)]
#[as_ref(str)]
#[debug("AccessToken(***)")]
#[from(String, &str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct AccessToken(String);

/// Pair of tokens handed out to a client on login or rotation.
#[derive(Clone, Debug, Serialize)]
pub struct TokenPair {
    /// [`AccessToken`] of the [`Session`].
    pub access_token: AccessToken,

    /// [`RefreshToken`] of the [`Session`].
    pub refresh_token: RefreshToken,
}

/// [`DateTime`] when a [`Session`] expires.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;

/// [`DateTime`] when a [`Session`] was created.
pub type CreationDateTime = DateTimeOf<(Session, unit::Creation)>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::DateTime;

    use super::{
        AccessToken, Device, Fingerprint, Id, RefreshToken, Session,
        UserAgent,
    };
    use crate::domain::user;

    fn session(expires_at: DateTime) -> Session {
        Session {
            id: Id::from(1),
            user_id: user::Id::new(),
            device: Device {
                user_agent: UserAgent::new("UA1").unwrap(),
                fingerprint: Fingerprint::new("F1").unwrap(),
            },
            refresh_token: RefreshToken::from("refresh"),
            access_token: None,
            expires_at: expires_at.coerce(),
            created_at: DateTime::UNIX_EPOCH.coerce(),
        }
    }

    #[test]
    fn expires_strictly_after_deadline() {
        let deadline = DateTime::from_unix_timestamp(100).unwrap();
        let s = session(deadline);

        assert!(!s.is_expired_at(deadline.coerce()));
        assert!(s.is_expired_at((deadline + Duration::from_secs(1)).coerce()));
    }

    #[test]
    fn empty_device_parts_are_rejected() {
        assert!(UserAgent::new("").is_none());
        assert!(Fingerprint::new("").is_none());
    }

    #[test]
    fn secrets_are_not_leaked_by_debug() {
        let refresh = RefreshToken::from("refresh-secret");
        let access = AccessToken::from("access-secret");

        assert!(!format!("{refresh:?}").contains("refresh-secret"));
        assert!(!format!("{access:?}").contains("access-secret"));
    }
}
