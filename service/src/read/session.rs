//! [`Session`] read model definition.

#[cfg(doc)]
use common::DateTime;
use serde::Serialize;

use crate::domain::{
    self,
    user::{self, session},
};

/// Client-facing view of a [`domain::Session`].
///
/// Never exposes the tokens of the [`domain::Session`].
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    /// ID of the [`domain::Session`].
    #[serde(rename = "session_id")]
    pub id: session::Id,

    /// ID of the [`domain::User`] the [`domain::Session`] belongs to.
    #[serde(skip)]
    pub user_id: user::Id,

    /// [`session::UserAgent`] of the device the [`domain::Session`] is bound
    /// to.
    pub user_agent: session::UserAgent,

    /// [`DateTime`] when the [`domain::Session`] expires.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub expires_at: session::ExpirationDateTime,

    /// [`DateTime`] when the [`domain::Session`] was created.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub created_at: session::CreationDateTime,
}

impl From<domain::Session> for Session {
    fn from(s: domain::Session) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            user_agent: s.device.user_agent,
            expires_at: s.expires_at,
            created_at: s.created_at,
        }
    }
}
