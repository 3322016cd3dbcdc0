//! Seams to external collaborators: request signing and URL presentation.
//!
//! The orchestrator and the fetch executor only see these traits, so tests can swap in
//! deterministic signers and recording presenters.

pub mod request_signer;
pub mod url_presenter;

pub use request_signer::*;
pub use url_presenter::*;
