//! Bucketed validation cache.
//!
//! Remembers which inodes passed verification. The bucket count is fixed at
//! construction; each bucket has its own lock, taken only for the set
//! operation itself.

use common::InodeId;
use parking_lot::Mutex;
use std::collections::hash_map::RandomState;
use std::collections::HashSet;
use std::hash::BuildHasher;
use std::num::NonZeroUsize;

pub struct ValidationCache {
    buckets: Box<[Mutex<HashSet<InodeId>>]>,
    hasher: RandomState,
}

impl ValidationCache {
    pub fn new(buckets: NonZeroUsize) -> Self {
        Self {
            buckets: (0..buckets.get())
                .map(|_| Mutex::new(HashSet::new()))
                .collect(),
            hasher: RandomState::new(),
        }
    }

    fn bucket(&self, id: InodeId) -> &Mutex<HashSet<InodeId>> {
        // Reduced modulo the bucket count, so the cast cannot index out of range.
        let slot = self.hasher.hash_one(id) % self.buckets.len() as u64;
        &self.buckets[slot as usize]
    }

    pub fn is_cached(&self, id: InodeId) -> bool {
        self.bucket(id).lock().contains(&id)
    }

    /// Records `id` as validated. Returns `false` if it already was.
    pub fn mark_validated(&self, id: InodeId) -> bool {
        self.bucket(id).lock().insert(id)
    }

    /// Drops the entry for `id`. Returns `false` if there was none.
    pub fn invalidate(&self, id: InodeId) -> bool {
        self.bucket(id).lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            bucket.lock().clear();
        }
    }
}

impl std::fmt::Debug for ValidationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCache")
            .field("buckets", &self.bucket_count())
            .field("entries", &self.len())
            .finish()
    }
}
