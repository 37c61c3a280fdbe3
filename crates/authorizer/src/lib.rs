//! Authorizer Library
//!
//! The access-control decision engine that sits in front of the posts
//! backend. For every request it locates a bearer token, validates it
//! against the identity provider's rotating public keys, resolves the
//! requester identity and emits an Allow or Deny decision document.
//!
//! # Architecture
//!
//! ```text
//! envelope -> auth::locator -> auth::token -> auth::jwks -> auth::validator
//!          -> auth::identity -> policy -> decision document
//! ```
//!
//! [`pipeline::Authorizer`] drives the stages; the HTTP surface in
//! `routes` / `handlers` / `middleware` exposes it.
//!
//! # Modules
//!
//! - `auth` - pipeline stages operating on tokens and keys
//! - `config` - Service configuration from environment
//! - `errors` - Internal denial reasons and the opaque boundary error
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authorization middleware for protected routes
//! - `observability` - Tracing and metrics setup
//! - `pipeline` - The decision state machine
//! - `policy` - Decision documents
//! - `routes` - Axum router setup
//! - `services` - Identity-provider client

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod policy;
pub mod routes;
pub mod services;

pub use errors::{AuthzError, Unauthorized};
pub use pipeline::{Authorizer, Stage};
pub use policy::{Decision, Effect, IdentityContext};
