//! Service provider descriptions.
//!
//! `descriptor` exposes validated endpoint metadata ([`ServiceProvider`]) and the quirks that
//! decorate 1.0a authorization URLs. `catalog` resolves built-in names (`GOOGLE`, `BUZZ`,
//! `LATITUDE`) and loads TOML provider files.

pub mod catalog;
pub mod descriptor;

pub use catalog::*;
pub use descriptor::*;
