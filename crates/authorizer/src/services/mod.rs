//! Clients for external systems.
//!
//! # Components
//!
//! - `identity_client` - user lookup against the identity provider

pub mod identity_client;

pub use identity_client::{
    mock::MockIdentityLookup, CognitoIdentityClient, IdentityLookup, UserAttribute, UserProfile,
};
