use std::num::NonZeroUsize;

use lru::LruCache;

use crate::world::chunk::Chunk;
use crate::world::coords::ChunkPos;

/// Bounded holding area for unmodified chunks that left the active set.
/// Anything in here can be regenerated from the seed, so dropping the oldest entry is always safe.
pub(crate) struct ChunkCache {
    inner: LruCache<ChunkPos, Chunk>,
}

impl ChunkCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Returns the least recently used entry if the insert pushed one out.
    pub(crate) fn put(&mut self, pos: ChunkPos, chunk: Chunk) -> Option<(ChunkPos, Chunk)> {
        self.inner.push(pos, chunk).filter(|(evicted, _)| *evicted != pos)
    }

    pub(crate) fn take(&mut self, pos: &ChunkPos) -> Option<Chunk> {
        self.inner.pop(pos)
    }

    pub(crate) fn contains(&self, pos: &ChunkPos) -> bool {
        self.inner.contains(pos)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.inner.cap().get()
    }
}
