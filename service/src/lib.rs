//! Service contains the session and token authentication logic.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod token;

use std::time::Duration;

use common::Clock;
use derive_more::Debug;

#[cfg(doc)]
use crate::{
    domain::user::session::{AccessToken, RefreshToken, Session},
    infra::Database,
};

pub use self::{command::Command, query::Query};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] encoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_encoding_key: jsonwebtoken::EncodingKey,

    /// [JWT] decoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// Issuer of [JWT]s, checked on decoding.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    pub jwt_issuer: String,

    /// Lifetime of an [`AccessToken`].
    pub access_token_ttl: Duration,

    /// Lifetime of a [`Session`] and its [`RefreshToken`].
    pub refresh_token_ttl: Duration,
}

impl Config {
    /// Creates a new [`Config`] signing [JWT]s with the provided HMAC
    /// `secret`.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[must_use]
    pub fn new(
        secret: impl AsRef<[u8]>,
        issuer: impl Into<String>,
        access_token_ttl: Duration,
        refresh_token_ttl: Duration,
    ) -> Self {
        let secret = secret.as_ref();
        Self {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(secret),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(secret),
            jwt_issuer: issuer.into(),
            access_token_ttl,
            refresh_token_ttl,
        }
    }
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Clock`] every expiry is checked against.
    clock: Clock,

    /// [`token::Codec`] of this [`Service`].
    tokens: token::Codec,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] running on the system [`Clock`].
    #[must_use]
    pub fn new(config: Config, database: Db) -> Self {
        Self::with_clock(config, database, Clock::system())
    }

    /// Creates a new [`Service`] running on the provided [`Clock`].
    #[must_use]
    pub fn with_clock(config: Config, database: Db, clock: Clock) -> Self {
        let tokens = token::Codec::new(&config, clock.clone());
        Self {
            config,
            database,
            clock,
            tokens,
        }
    }

    /// Returns [`Config`] of this [`Service`].
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Clock`] of this [`Service`].
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns [`token::Codec`] of this [`Service`].
    #[must_use]
    pub fn tokens(&self) -> &token::Codec {
        &self.tokens
    }
}
