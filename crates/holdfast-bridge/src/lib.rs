//! # holdfast-bridge: calls between applications
//!
//! An application exposing functions to another (the callee) mints a
//! capability token carrying a [`BridgeSpec`] of the zome functions it
//! exposes. The calling application stores that token against the callee's
//! DNA hash. Each bridged call presents the token and is checked against the
//! spec before it reaches the callee's zome.

mod capability;
mod error;
mod registry;
mod spec;

pub use capability::CapabilityStore;
pub use error::BridgeError;
pub use registry::{Bridge, BridgeHost, BridgeRegistry, BridgeSide};
pub use spec::BridgeSpec;

#[cfg(test)]
mod tests;
