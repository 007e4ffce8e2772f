//! Application provides REST API for interacting with the [`Service`].

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

pub mod api;
pub mod args;
pub mod config;
pub mod error;
pub mod guard;

use axum::{
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
// Used in binary.
use axum_client_ip as _;
use refinery as _;
use tokio as _;
use tower_http as _;
use tracing_subscriber as _;
// Used in tests.
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tower as _;

pub use self::{
    args::Args,
    config::Config,
    error::{AsError, Error},
};

/// [`Service`] with filled infrastructure dependencies.
///
/// [`Service`]: service::Service
pub type Service = service::Service<service::infra::Storage>;

/// Builds the [`Router`] of the REST API over the provided [`Service`].
pub fn router(service: Service) -> Router {
    let protected = Router::new()
        .route(
            "/users/:user_id",
            get(api::user::get).put(api::user::update_name),
        )
        .route("/users/:user_id/password", put(api::user::update_password))
        .route(
            "/users/:user_id/sessions",
            get(api::session::list).delete(api::session::revoke_all),
        )
        .route(
            "/users/:user_id/sessions/:session_id",
            get(api::session::get).delete(api::session::revoke),
        )
        .route_layer(middleware::from_fn(guard::access));

    let public = Router::new()
        .route("/users", post(api::user::create))
        .route(
            "/users/:user_id/sessions",
            post(api::session::create).merge(
                put(api::session::refresh)
                    .route_layer(middleware::from_fn(guard::refresh)),
            ),
        );

    Router::new()
        .route("/api/health", get(api::health))
        .nest("/api/v1", public)
        .nest("/api/v1/protected", protected)
        .layer(Extension(service))
}
