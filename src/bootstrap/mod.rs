//! One-time transport initialization for driver clients
//!
//! The host driver calls [`ziti_init`] (callback form) or [`init`] (async form)
//! while bootstrapping a client. [`Bootstrap`] guarantees the transport is
//! initialized at most once per owning client.

mod identity;
mod init;

pub use identity::{IdentityConfig, IdentityMaterial};
pub use init::{init, ziti_init, Bootstrap, InitOptions};
