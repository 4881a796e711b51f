//! FIFO post-transform vertex cache simulation
//!
//! Models the small vertex cache found after the vertex shader on GPUs: a
//! fixed-capacity queue where a hit leaves the queue untouched and a miss
//! pushes the vertex at the newest end, evicting the oldest entry when full.

use meshtune_core::{validate_indices, Error, Result};

const NOT_CACHED: u32 = u32::MAX;

/// Outcome of a single cache reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hit,
    Miss { evicted: Option<u32> },
}

impl Access {
    pub fn is_miss(&self) -> bool {
        matches!(self, Access::Miss { .. })
    }
}

/// Fixed-capacity FIFO cache of vertex indices.
///
/// Entries live in a ring buffer; a per-vertex slot table gives O(1)
/// membership and position queries. While the ring is not full its entries
/// occupy slots `0..len` and `head == len`.
#[derive(Debug, Clone)]
pub struct FifoCache {
    ring: Vec<u32>,
    head: usize,
    len: usize,
    slot_of: Vec<u32>,
}

/// Saved ring contents for rolling back tentative replays
#[derive(Debug, Clone)]
pub struct CacheCheckpoint {
    ring: Vec<u32>,
    head: usize,
    len: usize,
}

impl FifoCache {
    /// Create an empty cache of `capacity` entries over `vertex_count` vertices
    pub fn new(capacity: usize, vertex_count: usize) -> Result<Self> {
        if capacity < 3 {
            return Err(Error::InvalidCacheSize(capacity));
        }
        Ok(Self {
            ring: vec![NOT_CACHED; capacity],
            head: 0,
            len: 0,
            slot_of: vec![NOT_CACHED; vertex_count],
        })
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn contains(&self, vertex: u32) -> bool {
        self.slot_of[vertex as usize] != NOT_CACHED
    }

    /// Number of insertions made after `vertex` entered the cache; 0 for the
    /// newest entry, `None` if the vertex is not cached.
    #[inline]
    pub fn position(&self, vertex: u32) -> Option<usize> {
        let slot = self.slot_of[vertex as usize];
        if slot == NOT_CACHED {
            return None;
        }
        let capacity = self.ring.len();
        Some((self.head + capacity - 1 - slot as usize) % capacity)
    }

    /// Reference a vertex
    #[inline]
    pub fn access(&mut self, vertex: u32) -> Access {
        if self.contains(vertex) {
            return Access::Hit;
        }

        let capacity = self.ring.len();
        let evicted = if self.len == capacity {
            let oldest = self.ring[self.head];
            self.slot_of[oldest as usize] = NOT_CACHED;
            Some(oldest)
        } else {
            self.len += 1;
            None
        };

        self.ring[self.head] = vertex;
        self.slot_of[vertex as usize] = self.head as u32;
        self.head = (self.head + 1) % capacity;

        Access::Miss { evicted }
    }

    /// Reference the three corners of a triangle, returning the miss count
    #[inline]
    pub fn access_triangle(&mut self, triangle: &[u32]) -> usize {
        triangle
            .iter()
            .filter(|&&vertex| self.access(vertex).is_miss())
            .count()
    }

    /// Reference every triangle of an index buffer, returning the miss count
    pub fn replay(&mut self, indices: &[u32]) -> usize {
        indices
            .chunks_exact(3)
            .map(|triangle| self.access_triangle(triangle))
            .sum()
    }

    /// Iterate cached vertices from newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let capacity = self.ring.len();
        (0..self.len).map(move |position| self.ring[(self.head + capacity - 1 - position) % capacity])
    }

    /// Empty the cache
    pub fn clear(&mut self) {
        for &vertex in &self.ring[..self.len] {
            self.slot_of[vertex as usize] = NOT_CACHED;
        }
        self.head = 0;
        self.len = 0;
    }

    pub fn checkpoint(&self) -> CacheCheckpoint {
        CacheCheckpoint {
            ring: self.ring.clone(),
            head: self.head,
            len: self.len,
        }
    }

    /// Roll back to a checkpoint taken from this cache
    pub fn restore(&mut self, checkpoint: &CacheCheckpoint) {
        self.clear();
        self.ring.copy_from_slice(&checkpoint.ring);
        self.head = checkpoint.head;
        self.len = checkpoint.len;
        for (slot, &vertex) in self.ring[..self.len].iter().enumerate() {
            self.slot_of[vertex as usize] = slot as u32;
        }
    }
}

/// Replay an index buffer through a cold FIFO cache and count misses
pub fn simulate_misses(indices: &[u32], vertex_count: usize, cache_size: usize) -> Result<usize> {
    validate_indices(indices, vertex_count)?;
    let mut cache = FifoCache::new(cache_size, vertex_count)?;
    Ok(cache.replay(indices))
}

/// Replay an index buffer through a cold FIFO cache, recording every access
pub fn simulate_trace(indices: &[u32], vertex_count: usize, cache_size: usize) -> Result<Vec<Access>> {
    validate_indices(indices, vertex_count)?;
    let mut cache = FifoCache::new(cache_size, vertex_count)?;
    Ok(indices.iter().map(|&vertex| cache.access(vertex)).collect())
}
