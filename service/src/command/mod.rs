//! [`Command`] definition.

pub mod authenticate_user;
pub mod authorize_user_session;
pub mod create_user;
pub mod create_user_session;
pub mod drop_user_session;
pub mod drop_user_sessions;
pub mod refresh_user_session;
pub mod update_user_name;
pub mod update_user_password;
pub mod validate_user_session;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authenticate_user::AuthenticateUser,
    authorize_user_session::AuthorizeUserSession, create_user::CreateUser,
    create_user_session::CreateUserSession,
    drop_user_session::DropUserSession, drop_user_sessions::DropUserSessions,
    refresh_user_session::RefreshUserSession,
    update_user_name::UpdateUserName,
    update_user_password::UpdateUserPassword,
    validate_user_session::ValidateUserSession,
};

#[cfg(test)]
pub(crate) mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Select},
        Clock, DateTime,
    };
    use secrecy::SecretBox;

    use super::{Command as _, CreateUser, CreateUserSession};
    use crate::{
        domain::user::{self, session, Session},
        infra::{Database as _, Memory},
        Config,
    };

    /// [`crate::Service`] backed by a [`Memory`] database.
    pub(crate) type Service = crate::Service<Memory>;

    /// Lifetime of access tokens issued by [`service()`].
    pub(crate) const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

    /// Lifetime of sessions opened by [`service()`].
    pub(crate) const REFRESH_TTL: Duration =
        Duration::from_secs(30 * 24 * 60 * 60);

    pub(crate) fn service() -> (Service, Clock) {
        service_with_secret("secret")
    }

    pub(crate) fn service_with_secret(secret: &str) -> (Service, Clock) {
        let clock =
            Clock::manual(DateTime::from_unix_timestamp(1_700_000_000).unwrap());
        let config = Config::new(secret, "auth-test", ACCESS_TTL, REFRESH_TTL);
        (
            Service::with_clock(config, Memory::new(), clock.clone()),
            clock,
        )
    }

    pub(crate) fn device(ua: &str, fp: &str) -> session::Device {
        session::Device {
            user_agent: session::UserAgent::new(ua).unwrap(),
            fingerprint: session::Fingerprint::new(fp).unwrap(),
        }
    }

    /// Registers a new [`user::User`] with the `Secret123` password.
    pub(crate) async fn register(svc: &Service, email: &str) -> user::Id {
        svc.execute(CreateUser {
            email: user::Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(
                user::Password::new("Secret123").unwrap(),
            )),
            name: None,
        })
        .await
        .unwrap()
        .id
    }

    pub(crate) async fn login(
        svc: &Service,
        user_id: user::Id,
        ua: &str,
        fp: &str,
    ) -> session::TokenPair {
        svc.execute(CreateUserSession {
            user_id,
            device: device(ua, fp),
        })
        .await
        .unwrap()
    }

    pub(crate) async fn find_session(
        svc: &Service,
        id: session::Id,
    ) -> Option<Session> {
        svc.database()
            .execute(Select(By::<Option<Session>, _>::new(id)))
            .await
            .unwrap()
    }
}
