//! Credential model: protocol versions, consumers, access grants, scopes, and identifiers.

pub mod credential;
pub mod id;
pub mod scope;
pub mod secret;

pub use credential::*;
pub use id::*;
pub use scope::*;
pub use secret::*;
