//! Cluster lists: flat boundary offsets partitioning an index buffer

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Start offsets of locality clusters within an index buffer.
///
/// Offsets are in index units (always multiples of 3), strictly increasing
/// and begin at 0. Cluster `i` spans `offsets[i]..offsets[i + 1]`, the last
/// one runs to the end of the buffer. An empty list over a non-empty buffer
/// means one cluster spanning the whole mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clusters {
    offsets: Vec<u32>,
}

impl Clusters {
    /// Create an empty cluster list
    pub fn new() -> Self {
        Self::default()
    }

    /// A single cluster covering the whole index buffer
    pub fn single() -> Self {
        Self { offsets: vec![0] }
    }

    /// Build a cluster list from raw offsets without validating them
    pub fn from_offsets(offsets: Vec<u32>) -> Self {
        Self { offsets }
    }

    /// Append the start of a new cluster
    pub fn push(&mut self, offset: u32) {
        self.offsets.push(offset);
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn into_offsets(self) -> Vec<u32> {
        self.offsets
    }

    /// Check the list against an index buffer of `index_count` entries
    pub fn validate(&self, index_count: usize) -> Result<()> {
        if index_count == 0 {
            return match self.offsets.as_slice() {
                [] | [0] => Ok(()),
                _ => Err(Error::InvalidClusters(
                    "clusters given for an empty index buffer".to_string(),
                )),
            };
        }
        if let Some(&first) = self.offsets.first() {
            if first != 0 {
                return Err(Error::InvalidClusters(format!(
                    "first cluster starts at {} instead of 0",
                    first
                )));
            }
        }
        for (i, &offset) in self.offsets.iter().enumerate() {
            if offset % 3 != 0 {
                return Err(Error::InvalidClusters(format!(
                    "cluster {} starts at {}, which is not a triangle boundary",
                    i, offset
                )));
            }
            if offset as usize >= index_count {
                return Err(Error::InvalidClusters(format!(
                    "cluster {} starts at {}, past the end of {} indices",
                    i, offset, index_count
                )));
            }
            if i > 0 && offset <= self.offsets[i - 1] {
                return Err(Error::InvalidClusters(format!(
                    "cluster {} starts at {}, not after the previous start {}",
                    i,
                    offset,
                    self.offsets[i - 1]
                )));
            }
        }
        Ok(())
    }

    /// Index ranges of all clusters over a buffer of `index_count` entries
    pub fn ranges(&self, index_count: usize) -> ClusterRanges<'_> {
        ClusterRanges {
            offsets: &self.offsets,
            index_count,
            next: 0,
            implicit: self.offsets.is_empty() && index_count > 0,
        }
    }
}

impl From<Vec<u32>> for Clusters {
    fn from(offsets: Vec<u32>) -> Self {
        Self::from_offsets(offsets)
    }
}

/// Iterator over the index ranges of a [`Clusters`] list
#[derive(Debug, Clone)]
pub struct ClusterRanges<'a> {
    offsets: &'a [u32],
    index_count: usize,
    next: usize,
    implicit: bool,
}

impl Iterator for ClusterRanges<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.implicit {
            self.implicit = false;
            return Some(0..self.index_count);
        }
        let start = *self.offsets.get(self.next)? as usize;
        self.next += 1;
        let end = self
            .offsets
            .get(self.next)
            .map_or(self.index_count, |&end| end as usize);
        Some(start..end)
    }
}
