//! Token handling for the authorizer.
//!
//! Each submodule is one pipeline stage:
//!
//! - `locator` - finds the token in the request envelope
//! - `token` - splits and decodes it without verification
//! - `jwks` - resolves the signing key from the cached key set
//! - `validator` - verifies the signature and checks claims
//! - `identity` - derives the requester identity

pub mod claims;
pub mod identity;
pub mod jwks;
pub mod locator;
pub mod token;
pub mod validator;

pub use claims::{Audience, Claims, TokenKind};
pub use identity::{Identity, IdentityResolver};
pub use jwks::{JwksClient, PublicKey, PublicKeySet};
pub use locator::{locate_token, AuthorizerEvent, TokenSource};
pub use token::ParsedToken;
pub use validator::TokenValidator;
