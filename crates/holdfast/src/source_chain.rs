//! The node's source chain, with optional bundle staging.
//!
//! Commits are optimistic: a header is prepared under the read lock,
//! validated with no lock held, then appended under the write lock only if
//! the chain has not moved in between. While a bundle is open every commit
//! lands on the bundle's copy of the chain instead and its share step is
//! queued until the bundle closes.
//!
//! Lock order is always bundle, then main.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use holdfast_chain::{Chain, ChainError, PreparedHeader};
use holdfast_crypto::SigningKey;
use holdfast_types::{AGENT_ENTRY_TYPE, DNA_ENTRY_TYPE, Entry, Hash, Timestamp};

use crate::action::ChainAction;
use crate::error::{NodeError, Result};

// ============================================================================
// Bundles
// ============================================================================

#[derive(Debug)]
struct Bundle {
    id: u64,
    /// Copy of the main chain taken at start, extended by bundle commits.
    chain: Chain,
    base_index: usize,
    started: Timestamp,
    timeout_ms: u64,
    user_param: String,
    shares: Vec<ChainAction>,
}

/// What callers may learn about the open bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    pub user_param: String,
    pub started: Timestamp,
    pub timeout_ms: u64,
    /// Entries committed into the bundle so far.
    pub len: usize,
}

impl BundleInfo {
    /// Timeouts are advisory; nothing closes an expired bundle on its own.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.started.millis_until(now) >= self.timeout_ms
    }
}

// ============================================================================
// Reservations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Main,
    Bundle(u64),
}

/// A header prepared against a snapshot of the chain it will extend.
#[derive(Debug, Clone)]
pub(crate) struct Reservation {
    pub(crate) prepared: PreparedHeader,
    target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AppendOutcome {
    Main,
    Bundle,
    /// The chain moved since the reservation was made.
    Stale,
}

// ============================================================================
// SourceChain
// ============================================================================

#[derive(Debug)]
pub(crate) struct SourceChain {
    main: RwLock<Chain>,
    bundle: RwLock<Option<Bundle>>,
    next_bundle_id: AtomicU64,
    default_timeout_ms: u64,
}

impl SourceChain {
    pub(crate) fn new(default_timeout_ms: u64) -> Self {
        Self {
            main: RwLock::new(Chain::new()),
            bundle: RwLock::new(None),
            next_bundle_id: AtomicU64::new(1),
            default_timeout_ms,
        }
    }

    fn main_read(&self) -> Result<RwLockReadGuard<'_, Chain>> {
        self.main
            .read()
            .map_err(|_| NodeError::internal("lock poisoned"))
    }

    fn main_write(&self) -> Result<RwLockWriteGuard<'_, Chain>> {
        self.main
            .write()
            .map_err(|_| NodeError::internal("lock poisoned"))
    }

    fn bundle_read(&self) -> Result<RwLockReadGuard<'_, Option<Bundle>>> {
        self.bundle
            .read()
            .map_err(|_| NodeError::internal("lock poisoned"))
    }

    fn bundle_write(&self) -> Result<RwLockWriteGuard<'_, Option<Bundle>>> {
        self.bundle
            .write()
            .map_err(|_| NodeError::internal("lock poisoned"))
    }

    /// Appends the DNA and agent entries to an empty chain. Nothing is shared.
    pub(crate) fn genesis(
        &self,
        now: Timestamp,
        key: &SigningKey,
        dna: Entry,
        agent: Entry,
    ) -> Result<()> {
        let mut chain = self.main_write()?;
        let prepared = chain.prepare_header(now, DNA_ENTRY_TYPE, &dna, key, None)?;
        chain.add_entry(prepared, dna)?;
        let prepared = chain.prepare_header(now, AGENT_ENTRY_TYPE, &agent, key, None)?;
        chain.add_entry(prepared, agent)?;
        Ok(())
    }

    /// Runs `f` against the main chain under the read lock.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Chain) -> R) -> Result<R> {
        Ok(f(&*self.main_read()?))
    }

    pub(crate) fn len(&self) -> Result<usize> {
        Ok(self.main_read()?.len())
    }

    pub(crate) fn snapshot(&self) -> Result<Chain> {
        Ok(self.main_read()?.clone())
    }

    pub(crate) fn entry(&self, hash: &Hash) -> Result<Option<(Entry, String)>> {
        Ok(self
            .main_read()?
            .get_entry(hash)
            .map(|(e, t)| (e.clone(), t.to_string())))
    }

    /// Looks `hash` up in the open bundle.
    pub(crate) fn bundle_entry(&self, hash: &Hash) -> Result<Option<(Entry, String)>> {
        let bundle = self.bundle_read()?;
        let bundle = bundle.as_ref().ok_or(NodeError::BundleNotStarted)?;
        Ok(bundle
            .chain
            .get_entry(hash)
            .map(|(e, t)| (e.clone(), t.to_string())))
    }

    // ------------------------------------------------------------------------
    // Optimistic commit
    // ------------------------------------------------------------------------

    /// Prepares the header for the next position of whichever chain is
    /// currently accepting commits.
    pub(crate) fn reserve(
        &self,
        now: Timestamp,
        entry_type: &str,
        entry: &Entry,
        key: &SigningKey,
        change: Option<Hash>,
    ) -> Result<Reservation> {
        let bundle = self.bundle_read()?;
        if let Some(bundle) = bundle.as_ref() {
            let prepared = bundle.chain.prepare_header(now, entry_type, entry, key, change)?;
            return Ok(Reservation {
                prepared,
                target: Target::Bundle(bundle.id),
            });
        }
        let prepared = self
            .main_read()?
            .prepare_header(now, entry_type, entry, key, change)?;
        Ok(Reservation {
            prepared,
            target: Target::Main,
        })
    }

    /// Appends a validated reservation, or reports it stale.
    ///
    /// A bundle append keeps a copy of `action` for sharing at close.
    pub(crate) fn append(
        &self,
        reservation: Reservation,
        entry: Entry,
        action: &ChainAction,
    ) -> Result<AppendOutcome> {
        let mut bundle = self.bundle_write()?;
        let Reservation { prepared, target } = reservation;
        let result = match target {
            Target::Bundle(id) => {
                let Some(open) = bundle.as_mut().filter(|b| b.id == id) else {
                    return Ok(AppendOutcome::Stale);
                };
                open.chain.add_entry(prepared, entry).map(|()| {
                    open.shares.push(action.clone());
                    AppendOutcome::Bundle
                })
            }
            Target::Main => {
                if bundle.is_some() {
                    return Ok(AppendOutcome::Stale);
                }
                self.main_write()?
                    .add_entry(prepared, entry)
                    .map(|()| AppendOutcome::Main)
            }
        };
        match result {
            Err(ChainError::IndexMismatch { expected, actual }) => {
                tracing::debug!(expected, actual, "chain moved during commit");
                Ok(AppendOutcome::Stale)
            }
            other => Ok(other?),
        }
    }

    // ------------------------------------------------------------------------
    // Bundle lifecycle
    // ------------------------------------------------------------------------

    /// Opens a bundle. A zero timeout takes the configured default.
    pub(crate) fn start_bundle(&self, timeout_ms: u64, user_param: &str) -> Result<()> {
        let mut bundle = self.bundle_write()?;
        if bundle.is_some() {
            return Err(NodeError::ChainLockedForBundle);
        }
        let chain = self.main_read()?.clone();
        let timeout_ms = if timeout_ms == 0 {
            self.default_timeout_ms
        } else {
            timeout_ms
        };
        *bundle = Some(Bundle {
            id: self.next_bundle_id.fetch_add(1, Ordering::Relaxed),
            base_index: chain.len(),
            chain,
            started: Timestamp::now(),
            timeout_ms,
            user_param: user_param.to_string(),
            shares: Vec::new(),
        });
        tracing::info!(timeout_ms, "bundle started");
        Ok(())
    }

    /// Closes the open bundle. On commit its entries move to the main chain
    /// and the queued share steps are returned; otherwise they are dropped.
    pub(crate) fn close_bundle(&self, commit: bool) -> Result<Vec<ChainAction>> {
        let mut slot = self.bundle_write()?;
        let bundle = slot.take().ok_or(NodeError::BundleNotStarted)?;
        let staged = bundle.chain.len() - bundle.base_index;
        if !commit {
            tracing::info!(discarded = staged, "bundle canceled");
            return Ok(Vec::new());
        }

        let mut main = self.main_write()?;
        for index in bundle.base_index..bundle.chain.len() {
            let (hash, header, entry) = bundle
                .chain
                .get(index)
                .ok_or_else(|| NodeError::internal("bundle chain shorter than its length"))?;
            let prepared = PreparedHeader {
                index,
                hash,
                header: header.clone(),
            };
            main.add_entry(prepared, entry.clone())?;
        }
        tracing::info!(committed = staged, "bundle committed");
        Ok(bundle.shares)
    }

    pub(crate) fn bundle_info(&self) -> Result<Option<BundleInfo>> {
        Ok(self.bundle_read()?.as_ref().map(|b| BundleInfo {
            user_param: b.user_param.clone(),
            started: b.started,
            timeout_ms: b.timeout_ms,
            len: b.chain.len() - b.base_index,
        }))
    }
}
