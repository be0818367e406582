//! The cell arena: columnar per-cell attributes plus the ownership tree.
//!
//! Cells are addressed by stable integer indices into the columnar store;
//! parent/child links are plain index references, so the store is the sole
//! owner. Cells are never destroyed individually; fragmentation moves a
//! branch to a new colony but leaves every backing slot in place.

use crate::event::StateId;
use crate::store::{GrowMatrix, GrowVec};
use serde::{Deserialize, Serialize};

/// Stable index of a cell in the arena.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CellId(pub usize);

/// Stable index of a colony in the culture.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ColonyId(pub usize);

/// Columnar storage for every per-cell attribute.
#[derive(Debug, Serialize, Deserialize)]
pub struct CellStore {
    centers: GrowMatrix<f64>,
    ends: GrowMatrix<f64>,
    directions: GrowVec<f64>,
    lengths: GrowVec<f64>,
    ages: GrowVec<f64>,
    crowding: GrowVec<f64>,
    polarity: GrowVec<f64>,
    states: Vec<StateId>,
    parents: Vec<Option<CellId>>,
    children: Vec<Vec<CellId>>,
    colonies: Vec<Option<ColonyId>>,
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CellStore {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            centers: GrowMatrix::new(2),
            ends: GrowMatrix::new(2),
            directions: GrowVec::new(),
            lengths: GrowVec::new(),
            ages: GrowVec::new(),
            crowding: GrowVec::new(),
            polarity: GrowVec::new(),
            states: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            colonies: Vec::new(),
        }
    }

    /// Number of cells in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true when no cells exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Register a new cell, zero-initializing age, crowding, and polarity.
    /// Colony membership is assigned by `Colony::add_cell`.
    pub fn create_cell(
        &mut self,
        center: (f64, f64),
        end: (f64, f64),
        direction: f64,
        length: f64,
        parent: Option<CellId>,
        state: StateId,
    ) -> CellId {
        let index = self.centers.append_row(&[center.0, center.1]);
        self.ends.append_row(&[end.0, end.1]);
        self.directions.append(direction);
        self.lengths.append(length);
        self.ages.append(0.0);
        self.crowding.append(0.0);
        self.polarity.append(0.0);
        self.states.push(state);
        self.parents.push(parent);
        self.children.push(Vec::new());
        self.colonies.push(None);
        self.debug_assert_coherent();
        CellId(index)
    }

    /// Append `child` to `parent`'s child list, the only place the
    /// ownership tree grows.
    pub fn link_child(&mut self, parent: CellId, child: CellId) {
        self.children[parent.0].push(child);
    }

    /// Detach `child` from `parent`'s child list.
    ///
    /// # Panics
    ///
    /// Panics if `child` is not currently a child of `parent`. That is a
    /// fragmentation logic bug, not a recoverable condition.
    pub fn unlink_child(&mut self, parent: CellId, child: CellId) {
        let siblings = &mut self.children[parent.0];
        let position = siblings
            .iter()
            .position(|&entry| entry == child)
            .unwrap_or_else(|| panic!("cell {} is not a child of cell {}", child.0, parent.0));
        siblings.remove(position);
    }

    #[must_use]
    pub fn center(&self, cell: CellId) -> (f64, f64) {
        let row = self.centers.row(cell.0);
        (row[0], row[1])
    }

    #[must_use]
    pub fn end(&self, cell: CellId) -> (f64, f64) {
        let row = self.ends.row(cell.0);
        (row[0], row[1])
    }

    #[must_use]
    pub fn direction(&self, cell: CellId) -> f64 {
        self.directions.get(cell.0)
    }

    #[must_use]
    pub fn length(&self, cell: CellId) -> f64 {
        self.lengths.get(cell.0)
    }

    #[must_use]
    pub fn age(&self, cell: CellId) -> f64 {
        self.ages.get(cell.0)
    }

    pub(crate) fn set_age(&mut self, cell: CellId, age: f64) {
        self.ages.set(cell.0, age);
    }

    #[must_use]
    pub fn crowding(&self, cell: CellId) -> f64 {
        self.crowding.get(cell.0)
    }

    pub fn add_crowding(&mut self, cell: CellId, delta: f64) {
        self.crowding.set(cell.0, self.crowding.get(cell.0) + delta);
    }

    #[must_use]
    pub fn polarity(&self, cell: CellId) -> f64 {
        self.polarity.get(cell.0)
    }

    pub fn add_polarity(&mut self, cell: CellId, delta: f64) {
        self.polarity.set(cell.0, self.polarity.get(cell.0) + delta);
    }

    #[must_use]
    pub fn state(&self, cell: CellId) -> StateId {
        self.states[cell.0]
    }

    pub fn set_state(&mut self, cell: CellId, state: StateId) {
        self.states[cell.0] = state;
    }

    #[must_use]
    pub fn parent(&self, cell: CellId) -> Option<CellId> {
        self.parents[cell.0]
    }

    pub fn set_parent(&mut self, cell: CellId, parent: Option<CellId>) {
        self.parents[cell.0] = parent;
    }

    #[must_use]
    pub fn children(&self, cell: CellId) -> &[CellId] {
        &self.children[cell.0]
    }

    /// Colony the cell belongs to.
    ///
    /// # Panics
    ///
    /// Panics when called on a cell that was never attached to a colony;
    /// every construction path attaches within the same driver phase.
    #[must_use]
    pub fn colony(&self, cell: CellId) -> ColonyId {
        self.colonies[cell.0].expect("cell not attached to a colony")
    }

    pub fn set_colony(&mut self, cell: CellId, colony: ColonyId) {
        self.colonies[cell.0] = Some(colony);
    }

    /// Collect `root` and every descendant, depth-first.
    #[must_use]
    pub fn collect_subtree(&self, root: CellId) -> Vec<CellId> {
        let mut branch = Vec::new();
        let mut stack = vec![root];
        while let Some(cell) = stack.pop() {
            branch.push(cell);
            stack.extend(self.children[cell.0].iter().rev().copied());
        }
        branch
    }

    /// Advance every cell's age by `tau`.
    pub fn advance_ages(&mut self, tau: f64) {
        for age in self.ages.active_mut() {
            *age += tau;
        }
    }

    /// Multiplicatively grow (or decay) every cell's polarity quantity by
    /// `exp(binding_rate * tau)`.
    pub fn advance_polarity(&mut self, binding_rate: f64, tau: f64) {
        let scale = (binding_rate * tau).exp();
        for polarity in self.polarity.active_mut() {
            *polarity *= scale;
        }
    }

    /// Read-only view of the age column.
    #[must_use]
    pub fn ages(&self) -> &[f64] {
        self.ages.active()
    }

    /// Read-only view of the crowding column.
    #[must_use]
    pub fn crowding_column(&self) -> &[f64] {
        self.crowding.active()
    }

    /// Read-only view of the polarity column.
    #[must_use]
    pub fn polarity_column(&self) -> &[f64] {
        self.polarity.active()
    }

    /// Read-only view of the per-cell states.
    #[must_use]
    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    /// Flat `[x, y]` row-major view of the center points.
    #[must_use]
    pub fn centers(&self) -> &GrowMatrix<f64> {
        &self.centers
    }

    /// Flat `[x, y]` row-major view of the tip points.
    #[must_use]
    pub fn ends(&self) -> &GrowMatrix<f64> {
        &self.ends
    }

    #[inline]
    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.centers.rows(), self.ends.rows());
        debug_assert_eq!(self.centers.rows(), self.directions.len());
        debug_assert_eq!(self.centers.rows(), self.lengths.len());
        debug_assert_eq!(self.centers.rows(), self.ages.len());
        debug_assert_eq!(self.centers.rows(), self.crowding.len());
        debug_assert_eq!(self.centers.rows(), self.polarity.len());
        debug_assert_eq!(self.centers.rows(), self.states.len());
        debug_assert_eq!(self.centers.rows(), self.parents.len());
        debug_assert_eq!(self.centers.rows(), self.children.len());
        debug_assert_eq!(self.centers.rows(), self.colonies.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(store: &mut CellStore, x: f64) -> CellId {
        store.create_cell((x, 0.0), (x, 1.0), 0.0, 1.0, None, StateId(0))
    }

    #[test]
    fn create_cell_zero_initializes_columns() {
        let mut store = CellStore::new();
        let cell = spawn(&mut store, 2.0);
        assert_eq!(store.age(cell), 0.0);
        assert_eq!(store.crowding(cell), 0.0);
        assert_eq!(store.polarity(cell), 0.0);
        assert_eq!(store.center(cell), (2.0, 0.0));
        assert_eq!(store.end(cell), (2.0, 1.0));
        assert!(store.parent(cell).is_none());
    }

    #[test]
    fn subtree_collection_is_depth_first_from_root() {
        let mut store = CellStore::new();
        let root = spawn(&mut store, 0.0);
        let left = spawn(&mut store, 1.0);
        let right = spawn(&mut store, 2.0);
        let grandchild = spawn(&mut store, 3.0);
        store.link_child(root, left);
        store.link_child(root, right);
        store.link_child(left, grandchild);

        let branch = store.collect_subtree(root);
        assert_eq!(branch, vec![root, left, grandchild, right]);
    }

    #[test]
    fn unlink_child_detaches_exactly_one_link() {
        let mut store = CellStore::new();
        let root = spawn(&mut store, 0.0);
        let child = spawn(&mut store, 1.0);
        store.link_child(root, child);
        store.unlink_child(root, child);
        assert!(store.children(root).is_empty());
    }

    #[test]
    fn continuous_advancement_touches_every_cell() {
        let mut store = CellStore::new();
        let first = spawn(&mut store, 0.0);
        let second = spawn(&mut store, 1.0);
        store.add_polarity(first, 1.0);
        store.add_polarity(second, 2.0);

        store.advance_ages(0.5);
        store.advance_polarity(0.1, 0.5);

        assert_eq!(store.age(first), 0.5);
        assert_eq!(store.age(second), 0.5);
        let scale = (0.1_f64 * 0.5).exp();
        assert!((store.polarity(first) - scale).abs() < 1e-12);
        assert!((store.polarity(second) - 2.0 * scale).abs() < 1e-12);
    }
}
