//! # Authorizer Test Utilities
//!
//! Shared test utilities for the authorizer crate.
//!
//! This crate provides:
//! - Deterministic RSA fixtures (fixed keys for reproducible tests)
//! - Signed token builders (`TestTokenBuilder`)
//! - A mocked identity provider (`MockIdentityProvider`) serving the
//!   key-distribution and identity-lookup endpoints
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authorizer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let idp = MockIdentityProvider::start().await;
//!     idp.serve_jwks(&[&TestKeypair::primary()]).await;
//!
//!     let token = TestTokenBuilder::id_token().subject("user-123").build();
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
