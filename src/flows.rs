//! The login orchestrator, its protocol helpers, and the fetch executor.

pub mod fetch;
pub mod login;
pub mod protocol;
pub mod verifier;

pub use fetch::*;
pub use login::*;
pub use verifier::*;
