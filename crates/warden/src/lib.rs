//! # The Warden: Write/Exec Mutual Exclusion
//!
//! Keeps a file from being writable and trusted-executable at the same time.
//!
//! ## State machine (per inode)
//! - `Idle` (`writer_count == 0`): writers may open the file.
//! - `WriteHeld(n)`: `n` descriptors hold an exec-mapping hold; write-opens
//!   are refused with `Busy`.
//!
//! ## Ordering
//! Cache lookups, cache population and invalidation all happen under the
//! inode's lock, so an invalidation triggered by a write-open is visible to
//! every exec attempt that starts after it. A verification that raced with an
//! invalidation notices through the generation counter and does not cache.
//!
//! Lock order: inode lock, then cache bucket lock.

pub mod cache;
pub mod guard;
pub mod media;

pub use cache::ValidationCache;
pub use guard::{FileSecurity, InodeSecurity, InodeState};
pub use media::{Media, MediaBlacklist};

use common::{ConfigError, DenyReason, DigsigConfig, InodeId};
use std::num::NonZeroUsize;

/// What `begin_exec` found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecTicket {
    /// This call placed a new hold for the descriptor.
    pub acquired: bool,
    /// The host reports writers, so no hold could be placed.
    pub busy: bool,
    /// The inode is already validated.
    pub cached: bool,
    pub generation: u64,
}

/// Validation cache, media blacklist and the transitions that tie them to
/// per-inode state.
#[derive(Debug)]
pub struct Warden {
    cache: ValidationCache,
    blacklist: MediaBlacklist,
}

impl Warden {
    pub fn new(config: &DigsigConfig) -> Result<Self, ConfigError> {
        let buckets =
            NonZeroUsize::new(config.cache_buckets).ok_or(ConfigError::ZeroCacheBuckets)?;
        Ok(Self {
            cache: ValidationCache::new(buckets),
            blacklist: MediaBlacklist::from_config(config),
        })
    }

    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }

    pub fn check_media(&self, media: &Media) -> Result<(), DenyReason> {
        self.blacklist.check(media)
    }

    /// Places a hold for `file` unless it already has one, and reports the
    /// cache state observed under the same lock.
    pub fn begin_exec(
        &self,
        id: InodeId,
        inode: &InodeSecurity,
        file: &FileSecurity,
        open_writers: u32,
    ) -> ExecTicket {
        let mut state = inode.lock();
        let mut ticket = ExecTicket {
            acquired: false,
            busy: false,
            cached: self.cache.is_cached(id),
            generation: state.generation,
        };
        if !file.exec_mapped() {
            if guard::deny_write_access(&mut state, file, open_writers) {
                ticket.acquired = true;
            } else {
                ticket.busy = true;
            }
        }
        log::trace!(
            "exec {id}: writer_count={} {ticket:?}",
            state.writer_count
        );
        ticket
    }

    /// Gives back `file`'s hold. Returns `false` if it held none.
    pub fn release(&self, inode: &InodeSecurity, file: &FileSecurity) -> bool {
        guard::allow_write_access(&mut inode.lock(), file)
    }

    /// Marks `id` validated if nothing invalidated it since `generation`.
    pub fn commit(&self, id: InodeId, inode: &InodeSecurity, generation: u64) -> bool {
        let state = inode.lock();
        if state.generation != generation {
            log::debug!("{id} invalidated during verification, not caching");
            return false;
        }
        self.cache.mark_validated(id);
        true
    }

    /// A write-open was requested. The cache entry is dropped either way;
    /// the open itself is refused while holds are outstanding.
    pub fn write_requested(&self, id: InodeId, inode: &InodeSecurity) -> Result<(), DenyReason> {
        let mut state = inode.lock();
        Self::invalidate_locked(&self.cache, id, &mut state);
        if state.writer_count > 0 {
            return Err(DenyReason::Busy);
        }
        Ok(())
    }

    /// Forgets any trust in `id` (unlink, inode teardown).
    pub fn forget(&self, id: InodeId, inode: &InodeSecurity) -> bool {
        let mut state = inode.lock();
        Self::invalidate_locked(&self.cache, id, &mut state)
    }

    fn invalidate_locked(cache: &ValidationCache, id: InodeId, state: &mut InodeState) -> bool {
        state.generation = state.generation.wrapping_add(1);
        let removed = cache.invalidate(id);
        if removed {
            log::debug!("invalidated cached validation of {id}");
        }
        removed
    }

    /// Drops every cache entry.
    pub fn clear(&self) {
        self.cache.clear();
    }
}
