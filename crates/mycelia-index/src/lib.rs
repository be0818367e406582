//! Spatial hashing for colony neighborhood queries.
//!
//! Each colony owns one [`SpatialHash`]: a uniform grid bucketing cell
//! indices by the truncated integer coordinates of their center point.
//! Queries return the union of the 3×3 bucket neighborhood around a point;
//! callers are expected to apply an exact distance filter to the candidate
//! set afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors emitted when constructing a spatial hash.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive partition size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Integer bucket coordinates derived from a point.
pub type BucketKey = (i64, i64);

const NEIGHBOR_OFFSETS: [(i64, i64); 9] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 0),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Uniform grid mapping bucket keys to the cell indices whose centers fall inside.
///
/// The partition size must be at least the maximum interaction radius for the
/// 3×3 query to cover all true neighbors; the engine derives it from the
/// crowding kernel's effective range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialHash {
    partition_size: f64,
    #[serde(skip)]
    buckets: HashMap<BucketKey, Vec<usize>>,
}

impl SpatialHash {
    /// Create an empty grid with the provided partition size.
    pub fn new(partition_size: f64) -> Result<Self, IndexError> {
        if !partition_size.is_finite() || partition_size <= 0.0 {
            return Err(IndexError::InvalidConfig(
                "partition_size must be positive and finite",
            ));
        }
        Ok(Self {
            partition_size,
            buckets: HashMap::new(),
        })
    }

    /// Edge length of one grid bucket.
    #[must_use]
    pub fn partition_size(&self) -> f64 {
        self.partition_size
    }

    /// Total number of stored entries across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Returns true when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Convert a point to its bucket key.
    #[must_use]
    pub fn bucket_key(&self, point: (f64, f64)) -> BucketKey {
        (
            (point.0 / self.partition_size).floor() as i64,
            (point.1 / self.partition_size).floor() as i64,
        )
    }

    /// Bucket `index` under the key of `point`.
    pub fn insert(&mut self, index: usize, point: (f64, f64)) {
        let key = self.bucket_key(point);
        self.buckets.entry(key).or_default().push(index);
    }

    /// Collect every index in the 3×3 bucket neighborhood of `point`.
    ///
    /// The result is a candidate set only; entries may lie farther than the
    /// partition size from `point`.
    #[must_use]
    pub fn query(&self, point: (f64, f64)) -> Vec<usize> {
        let (kx, ky) = self.bucket_key(point);
        let mut out = Vec::new();
        for (dx, dy) in NEIGHBOR_OFFSETS {
            if let Some(bucket) = self.buckets.get(&(kx + dx, ky + dy)) {
                out.extend_from_slice(bucket);
            }
        }
        out
    }

    /// Remove a batch of entries, each keyed by the exact point it was
    /// inserted under.
    ///
    /// Removal is exhaustive by construction: every entry is looked up by its
    /// bucket key rather than by spatial query. A missing entry means the
    /// caller's bookkeeping diverged from the grid and is treated as a
    /// contract violation.
    ///
    /// # Panics
    ///
    /// Panics if any `(index, point)` pair is not present in the grid.
    pub fn remove_batch(&mut self, entries: &[(usize, (f64, f64))]) {
        for &(index, point) in entries {
            let key = self.bucket_key(point);
            let bucket = self
                .buckets
                .get_mut(&key)
                .unwrap_or_else(|| panic!("no bucket at {key:?} for index {index}"));
            let position = bucket
                .iter()
                .position(|&entry| entry == index)
                .unwrap_or_else(|| panic!("index {index} missing from bucket {key:?}"));
            bucket.swap_remove(position);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }

    /// Drop all entries while keeping the partition size.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_partition_size() {
        assert!(SpatialHash::new(0.0).is_err());
        assert!(SpatialHash::new(-1.0).is_err());
        assert!(SpatialHash::new(f64::NAN).is_err());
        assert!(SpatialHash::new(1.0).is_ok());
    }

    #[test]
    fn query_covers_three_by_three_neighborhood() {
        let mut grid = SpatialHash::new(1.0).expect("grid");
        grid.insert(0, (0.0, 0.0));
        grid.insert(1, (0.4, 0.4));
        grid.insert(2, (10.0, 10.0));

        let mut hits = grid.query((0.0, 0.0));
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn query_against_empty_region_returns_empty_set() {
        let mut grid = SpatialHash::new(2.5).expect("grid");
        grid.insert(7, (100.0, 100.0));
        assert!(grid.query((0.0, 0.0)).is_empty());
    }

    #[test]
    fn negative_coordinates_floor_to_distinct_buckets() {
        let grid = SpatialHash::new(1.0).expect("grid");
        assert_eq!(grid.bucket_key((-0.5, -0.5)), (-1, -1));
        assert_eq!(grid.bucket_key((0.5, 0.5)), (0, 0));
    }

    #[test]
    fn remove_batch_uses_exact_bucket_keys() {
        let mut grid = SpatialHash::new(1.0).expect("grid");
        let points = [(0.2, 0.2), (0.8, 0.8), (3.5, 3.5)];
        for (index, &point) in points.iter().enumerate() {
            grid.insert(index, point);
        }
        assert_eq!(grid.len(), 3);

        grid.remove_batch(&[(0, points[0]), (2, points[2])]);
        assert_eq!(grid.len(), 1);

        let hits = grid.query((0.5, 0.5));
        assert_eq!(hits, vec![1]);
        assert!(grid.query((3.5, 3.5)).is_empty());
    }

    #[test]
    #[should_panic(expected = "missing from bucket")]
    fn removing_unknown_entry_panics() {
        let mut grid = SpatialHash::new(1.0).expect("grid");
        grid.insert(0, (0.0, 0.0));
        grid.remove_batch(&[(99, (0.0, 0.0))]);
    }
}
