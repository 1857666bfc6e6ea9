//! # holdfast-chain: the local source chain
//!
//! Each agent keeps an append-only list of signed headers, each pointing at an
//! entry and at the header before it. This crate owns the in-memory chain
//! structure: building headers for the next position, appending, lookup by
//! entry or header hash, integrity checks and the marshaled subset shipped in
//! validation packages.
//!
//! The chain itself is not synchronized. Callers that commit concurrently wrap
//! it in a lock and retry on [`ChainError::IndexMismatch`].

mod chain;
mod error;
mod marshal;

pub use chain::{Chain, PreparedHeader};
pub use error::ChainError;
pub use marshal::{ChainSlice, MarshalFlags, SliceEntry, SliceRecord};
