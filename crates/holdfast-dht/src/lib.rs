//! # holdfast-dht: the holding node's view of the DHT
//!
//! - [`DhtStore`]: status-tagged records, link events, peer lists and chain
//!   boundary markers, each mutation atomic under one lock
//! - [`PeerTable`]: known peers ordered by XOR distance, used to decide which
//!   nodes should hold a hash
//!
//! Records are never removed. A record enters as `Live` or `Rejected` and a
//! live record later moves to `Modified` (with a forward pointer) or `Deleted`.

mod error;
mod routing;
mod store;

pub use error::DhtError;
pub use routing::{ALPHA, CLOSER_PEER_COUNT, PeerTable};
pub use store::{BoundaryKind, BoundaryRecord, DhtStore, HeldRecord, LinkRecord};
