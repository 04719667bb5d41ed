//! Per-inode and per-descriptor security state.
//!
//! `InodeSecurity::writer_count` is the number of exec-mapping holds this
//! subsystem has placed on the inode; while it is non-zero the inode may not
//! be opened for writing. `FileSecurity::exec_mapped` records whether a given
//! descriptor owns one of those holds, so each descriptor contributes at
//! most one and gives it back exactly once.
//!
//! Both are mutated only under the inode's lock. The lock is never held
//! across I/O.

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InodeState {
    pub writer_count: u32,
    /// Bumped on every invalidation. A verification only populates the cache
    /// if the generation it started under is still current.
    pub generation: u64,
}

/// Security blob attached to an inode, created with it.
#[derive(Debug, Default)]
pub struct InodeSecurity {
    state: Mutex<InodeState>,
}

impl InodeSecurity {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, InodeState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> InodeState {
        *self.state.lock()
    }

    pub fn writer_count(&self) -> u32 {
        self.state.lock().writer_count
    }
}

/// Security blob attached to an open descriptor.
#[derive(Debug, Default)]
pub struct FileSecurity {
    exec_mapped: AtomicBool,
}

impl FileSecurity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec_mapped(&self) -> bool {
        self.exec_mapped.load(Ordering::Acquire)
    }

    /// Caller holds the inode lock.
    pub(crate) fn set_exec_mapped(&self, held: bool) {
        self.exec_mapped.store(held, Ordering::Release);
    }
}

/// Places a hold for `file`. Fails if the host reports writers.
pub(crate) fn deny_write_access(
    state: &mut InodeState,
    file: &FileSecurity,
    open_writers: u32,
) -> bool {
    if open_writers > 0 {
        return false;
    }
    state.writer_count += 1;
    file.set_exec_mapped(true);
    true
}

/// Returns `file`'s hold, if it has one.
pub(crate) fn allow_write_access(state: &mut InodeState, file: &FileSecurity) -> bool {
    if !file.exec_mapped() {
        return false;
    }
    state.writer_count = state.writer_count.saturating_sub(1);
    file.set_exec_mapped(false);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_and_release() {
        let inode = InodeSecurity::new();
        let file = FileSecurity::new();
        assert!(deny_write_access(&mut inode.lock(), &file, 0));
        assert_eq!(inode.writer_count(), 1);
        assert!(file.exec_mapped());

        assert!(allow_write_access(&mut inode.lock(), &file));
        assert_eq!(inode.writer_count(), 0);
        assert!(!file.exec_mapped());
        assert!(!allow_write_access(&mut inode.lock(), &file));
        assert_eq!(inode.writer_count(), 0);
    }

    #[test]
    fn test_external_writer_blocks_hold() {
        let inode = InodeSecurity::new();
        let file = FileSecurity::new();
        assert!(!deny_write_access(&mut inode.lock(), &file, 1));
        assert_eq!(inode.writer_count(), 0);
        assert!(!file.exec_mapped());
    }

    #[test]
    fn test_holds_from_several_descriptors_stack() {
        let inode = InodeSecurity::new();
        let files: Vec<_> = (0..3).map(|_| FileSecurity::new()).collect();
        for f in &files {
            assert!(deny_write_access(&mut inode.lock(), f, 0));
        }
        assert_eq!(inode.writer_count(), 3);
        allow_write_access(&mut inode.lock(), &files[1]);
        assert_eq!(inode.writer_count(), 2);
    }
}
