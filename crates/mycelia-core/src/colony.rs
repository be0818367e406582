//! Colonies: independently indexed, spatially hashed partitions of the
//! cell population, each rooted at one founder cell.

use crate::cell::{CellId, CellStore, ColonyId};
use crate::store::GrowVec;
use mycelia_index::SpatialHash;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One colony: a root cell, its member index set, and its own spatial grid.
///
/// Invariant: the grid contains exactly the member set's center coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Colony {
    id: ColonyId,
    root: CellId,
    members: GrowVec<usize>,
    grid: SpatialHash,
}

impl Colony {
    /// Construct an empty colony around `root`. The root itself must be
    /// attached via [`Self::add_cell`] by the caller (the culture does this
    /// immediately, so the invariant holds between driver phases).
    #[must_use]
    pub fn new(id: ColonyId, root: CellId, grid: SpatialHash) -> Self {
        Self {
            id,
            root,
            members: GrowVec::new(),
            grid,
        }
    }

    #[must_use]
    pub fn id(&self) -> ColonyId {
        self.id
    }

    #[must_use]
    pub fn root(&self) -> CellId {
        self.root
    }

    /// Number of member cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.members.len()
    }

    /// Member cell indices, in insertion order.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        self.members.active()
    }

    /// Take membership of `cell`: set its colony link, record its index,
    /// and insert its center into the spatial grid.
    pub fn add_cell(&mut self, cell: CellId, store: &mut CellStore) {
        store.set_colony(cell, self.id);
        self.members.append(cell.0);
        self.grid.insert(cell.0, store.center(cell));
    }

    /// Apply [`Self::add_cell`] to every cell of a detached branch.
    pub fn add_branch(&mut self, branch: &[CellId], store: &mut CellStore) {
        for &cell in branch {
            self.add_cell(cell, store);
        }
    }

    /// Remove a branch from the member set and from the spatial grid.
    ///
    /// Grid removal is keyed by each cell's stored center, never by spatial
    /// query, so it is exhaustive regardless of bucket occupancy.
    ///
    /// # Panics
    ///
    /// Panics if any branch cell is not a member. That is a fragmentation
    /// logic bug, not a recoverable condition.
    pub fn remove_branch(&mut self, branch: &[CellId], store: &CellStore) {
        let doomed: HashSet<usize> = branch.iter().map(|cell| cell.0).collect();
        let slots: Vec<usize> = self
            .members
            .active()
            .iter()
            .enumerate()
            .filter(|(_, index)| doomed.contains(index))
            .map(|(slot, _)| slot)
            .collect();
        assert_eq!(
            slots.len(),
            doomed.len(),
            "branch contains cells that are not members of colony {}",
            self.id.0
        );
        self.members.batch_remove(&slots);

        let entries: Vec<(usize, (f64, f64))> = branch
            .iter()
            .map(|&cell| (cell.0, store.center(cell)))
            .collect();
        self.grid.remove_batch(&entries);
    }

    /// Candidate neighbor indices around `point` (3×3 grid buckets);
    /// callers must apply an exact distance filter.
    #[must_use]
    pub fn neighbours(&self, point: (f64, f64)) -> Vec<usize> {
        self.grid.query(point)
    }
}
