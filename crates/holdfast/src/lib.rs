//! # Holdfast
//!
//! Agent-centric, peer-validated ledger.
//!
//! Every agent keeps its own append-only source chain. Whatever it commits
//! publicly is pushed to the peers nearest the entry's hash, and each of
//! them fetches the entry back from its source, validates it independently
//! and only then holds it. This gives:
//!
//! - **No global order** - Only each chain is strictly ordered
//! - **Independent validation** - Holders never trust the committer's verdict
//! - **Rejection is data** - Invalid entries are held as `Rejected`, not dropped
//! - **Forward pointers** - Modified records redirect to their replacement
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                             Node                              │
//! │  ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │  Action  │ → │ Validation │ → │  Source  │ → │  Share   │  │
//! │  │ (commit) │   │  (sys+app) │   │  chain   │   │ (change) │  │
//! │  └──────────┘   └────────────┘   └──────────┘   └──────────┘  │
//! │                                                      ↓        │
//! │  ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │ DhtStore │ ← │ Validation │ ← │  Fetch   │ ← │  Hold    │  │
//! │  │ (status) │   │ (re-done)  │   │ (source) │   │ request  │  │
//! │  └──────────┘   └────────────┘   └──────────┘   └──────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use holdfast::{MemoryNetwork, Node, GetOptions};
//!
//! let network = MemoryNetwork::new();
//! let node = Node::builder(dna).build()?;
//! network.join(&node)?;
//!
//! let hash = node.commit("profile", r#"{"name":"ada"}"#)?;
//! let found = node.get(&hash, GetOptions::default())?;
//! ```
//!
//! # Modules
//!
//! - **Node**: [`Node`], [`NodeBuilder`] - commits, queries, bundles, rotation
//! - **Actions**: [`ActionKind`] and one type per action
//! - **Validation**: [`ValidationCallback`] - the application's say
//! - **Warrants**: [`Warrant`], [`WarrantRegistry`] - proofs for peer lists
//! - **Transport**: [`Transport`], [`MemoryNetwork`]

mod action;
mod agent;
mod callback;
mod error;
mod node;
mod package;
mod source_chain;
mod transport;
mod validate;
mod warrant;

pub use action::{
    ActionKind, BoundaryAction, ChainAction, CommitAction, CommittingAction, DelAction,
    GetAction, GetLinksAction, GetLinksOptions, GetOptions, GetResult, LinkAction, ListAddAction,
    MigrateAction, ModAction, PutAction, SendAction, ValidatingAction,
};
pub use agent::{AgentContext, Rotation};
pub use callback::{
    AcceptAll, BundleCancelResponse, ValidationCallback, ValidationRequest, interpret_outcome,
};
pub use error::{NodeError, Result, VALIDATION_FAILED};
pub use node::{Node, NodeBuilder, NodeStats, StatsSnapshot};
pub use package::{ChainOpt, PackagingRequest, ValidationPackage, make_package, make_validation_package};
pub use source_chain::BundleInfo;
pub use transport::{MemoryNetwork, Transport};
pub use warrant::{
    SELF_REVOCATION_WARRANT, SelfRevocationWarrant, Warrant, WarrantDecoder, WarrantRegistry,
};

// Re-export the vocabulary applications build against
pub use holdfast_bridge::{Bridge, BridgeHost, BridgeSide, BridgeSpec};
pub use holdfast_config::HoldfastConfig;
pub use holdfast_crypto::{SelfRevocation, SigningKey, VerifyingKey};
pub use holdfast_dht::BoundaryKind;
pub use holdfast_types::{
    AgentEntry, DataFormat, Dna, Entry, EntryDef, GetMask, Hash, Header, LinkSpec, LinksEntry,
    MigrateEntry, MigrateType, PeerId, Sharing, Status, StatusMask, Zome,
};
pub use holdfast_wire::{AppMsg, ListType, Protocol, TaggedHash};

#[cfg(test)]
mod tests;
