//! Save/resume interchange: columnar per-cell arrays plus the relational
//! manifest (parent links, state and colony indices) needed to reconstruct
//! the population and ownership tree.
//!
//! A snapshot captures population state, not the definition tables: restore
//! targets a culture bootstrapped with the same elements, states,
//! conditions, and events. The RNG is deliberately excluded; a restored run
//! continues from the configured seed, not from the saved run's stream.

use crate::cell::{CellId, ColonyId};
use crate::colony::Colony;
use crate::condition::{self, ResponseKind};
use crate::config::CultureError;
use crate::culture::Culture;
use crate::event::StateId;
use serde::{Deserialize, Serialize};

/// One cell's full columnar and relational record.
///
/// Child lists are not stored: children are re-linked from parent links in
/// index order, which is creation order and therefore reproduces the
/// original lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellManifest {
    pub center: (f64, f64),
    pub end: (f64, f64),
    pub direction: f64,
    pub length: f64,
    pub age: f64,
    pub crowding: f64,
    pub polarity: f64,
    pub state: usize,
    pub parent: Option<usize>,
    pub colony: usize,
}

/// One colony's root and member list, in membership order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColonyManifest {
    pub root: usize,
    pub members: Vec<usize>,
}

/// Everything needed to resume a run on a same-bootstrapped culture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CultureSnapshot {
    pub time: f64,
    pub fired_count: u64,
    pub element_amounts: Vec<f64>,
    pub cells: Vec<CellManifest>,
    pub colonies: Vec<ColonyManifest>,
}

impl Culture {
    /// Capture the current population state.
    #[must_use]
    pub fn snapshot(&self) -> CultureSnapshot {
        let cells = (0..self.cells.len())
            .map(|index| {
                let cell = CellId(index);
                CellManifest {
                    center: self.cells.center(cell),
                    end: self.cells.end(cell),
                    direction: self.cells.direction(cell),
                    length: self.cells.length(cell),
                    age: self.cells.age(cell),
                    crowding: self.cells.crowding(cell),
                    polarity: self.cells.polarity(cell),
                    state: self.cells.state(cell).0,
                    parent: self.cells.parent(cell).map(|parent| parent.0),
                    colony: self.cells.colony(cell).0,
                }
            })
            .collect();
        let colonies = self
            .colonies
            .iter()
            .map(|colony| ColonyManifest {
                root: colony.root().0,
                members: colony.members().to_vec(),
            })
            .collect();
        CultureSnapshot {
            time: self.time,
            fired_count: self.fired_count,
            element_amounts: self.elements.iter().map(|element| element.amount).collect(),
            cells,
            colonies,
        }
    }

    /// Replace this culture's population state with the snapshot's.
    ///
    /// The culture must already carry the definition tables the snapshot was
    /// taken against; indices out of range for those tables are rejected
    /// before any state is touched.
    pub fn restore(&mut self, snapshot: &CultureSnapshot) -> Result<(), CultureError> {
        self.validate_snapshot(snapshot)?;

        self.time = snapshot.time;
        self.fired_count = snapshot.fired_count;
        for (element, &amount) in self.elements.iter_mut().zip(&snapshot.element_amounts) {
            element.amount = amount;
        }

        self.cells = crate::cell::CellStore::new();
        self.colonies = Vec::new();
        self.masks = crate::store::GrowMatrix::new(self.events.len());
        self.factors = crate::store::GrowMatrix::new(self.conditions.len());
        self.propensities = crate::store::GrowMatrix::new(self.events.len());

        for (index, manifest) in snapshot.cells.iter().enumerate() {
            let state = StateId(manifest.state);
            let cell = self.cells.create_cell(
                manifest.center,
                manifest.end,
                manifest.direction,
                manifest.length,
                manifest.parent.map(CellId),
                state,
            );
            debug_assert_eq!(cell.0, index);
            if let Some(parent) = manifest.parent {
                self.cells.link_child(CellId(parent), cell);
            }
            self.cells.set_age(cell, manifest.age);
            self.cells.add_crowding(cell, manifest.crowding);
            self.cells.add_polarity(cell, manifest.polarity);
            self.append_cell_rows(cell, state);
        }

        // static factor columns reflect the restored crowding, not zero
        let alpha = self.config.crowding.alpha;
        for row in 0..self.cells.len() {
            let factor = condition::crowding_factor(self.cells.crowding(CellId(row)), alpha);
            for (column, condition) in self.conditions.iter().enumerate() {
                if condition.kind == ResponseKind::Static {
                    self.factors.set(row, column, factor);
                }
            }
        }

        for (index, manifest) in snapshot.colonies.iter().enumerate() {
            let mut colony = Colony::new(
                ColonyId(index),
                CellId(manifest.root),
                self.grid_prototype.clone(),
            );
            for &member in &manifest.members {
                colony.add_cell(CellId(member), &mut self.cells);
            }
            self.colonies.push(colony);
        }
        Ok(())
    }

    fn validate_snapshot(&self, snapshot: &CultureSnapshot) -> Result<(), CultureError> {
        if snapshot.element_amounts.len() != self.elements.len() {
            return Err(CultureError::SnapshotMismatch(
                "element amount table does not match the element definitions",
            ));
        }
        let population = snapshot.cells.len();
        for (index, manifest) in snapshot.cells.iter().enumerate() {
            if manifest.state >= self.states.len() {
                return Err(CultureError::SnapshotMismatch(
                    "cell references an undefined state",
                ));
            }
            if manifest.colony >= snapshot.colonies.len() {
                return Err(CultureError::SnapshotMismatch(
                    "cell references a colony outside the manifest",
                ));
            }
            match manifest.parent {
                Some(parent) if parent >= index => {
                    return Err(CultureError::SnapshotMismatch(
                        "cell parent does not precede the cell",
                    ));
                }
                _ => {}
            }
        }
        let mut owners: Vec<Option<usize>> = vec![None; population];
        for (index, manifest) in snapshot.colonies.iter().enumerate() {
            if manifest.root >= population
                || manifest.members.iter().any(|&member| member >= population)
            {
                return Err(CultureError::SnapshotMismatch(
                    "colony references a cell outside the population",
                ));
            }
            for &member in &manifest.members {
                if owners[member].replace(index).is_some() {
                    return Err(CultureError::SnapshotMismatch(
                        "cell appears in more than one colony member list",
                    ));
                }
            }
        }
        for (index, manifest) in snapshot.cells.iter().enumerate() {
            match owners[index] {
                Some(owner) if owner == manifest.colony => {}
                Some(_) => {
                    return Err(CultureError::SnapshotMismatch(
                        "cell colony index disagrees with the member lists",
                    ));
                }
                None => {
                    return Err(CultureError::SnapshotMismatch(
                        "cell is missing from every colony member list",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, GrowAction};
    use crate::chemistry::{Element, Reaction};
    use crate::condition::Condition;
    use crate::config::CultureConfig;
    use crate::culture::NullObserver;
    use crate::event::{Event, State};

    fn bootstrapped(seed: u64) -> Culture {
        let config = CultureConfig {
            rng_seed: Some(seed),
            ..CultureConfig::default()
        };
        let mut culture = Culture::new(config).expect("valid config");
        let nutrient = culture.add_element(Element::new("Starch", "S", 200.0));
        let reaction = culture.add_reaction(Reaction::new(
            "consume",
            1.0,
            vec![(nutrient, 1)],
            Vec::new(),
        ));
        let crowded = culture.add_condition(Condition::crowding("crowded"));
        let tip = culture.add_state(State::new("tip"));
        let mut grow = GrowAction::straight(1.0);
        grow.child_actions.push(Action::Crowding { condition: crowded });
        culture.add_event(Event {
            name: "grow".into(),
            ingoing: vec![tip],
            outgoing: tip,
            conditions: vec![crowded],
            action: Action::Grow(grow),
            reaction,
        });
        culture.spawn_spore((0.0, 0.0), 0.0, tip);
        culture
    }

    #[test]
    fn snapshot_round_trips_population_state() {
        let mut source = bootstrapped(21);
        source.run(&mut NullObserver);
        let snapshot = source.snapshot();
        assert!(snapshot.cells.len() > 1);

        let mut target = bootstrapped(22);
        target.restore(&snapshot).expect("restore");

        assert_eq!(target.snapshot(), snapshot);
        assert_eq!(target.time(), source.time());
        assert_eq!(target.fired_count(), source.fired_count());
        assert_eq!(target.cells().len(), source.cells().len());
        for index in 0..source.cells().len() {
            let cell = CellId(index);
            assert_eq!(target.cells().center(cell), source.cells().center(cell));
            assert_eq!(target.cells().children(cell), source.cells().children(cell));
            assert_eq!(target.cells().colony(cell), source.cells().colony(cell));
        }
    }

    #[test]
    fn restored_culture_refreshes_the_same_total() {
        let mut source = bootstrapped(23);
        for _ in 0..20 {
            source.step();
        }
        let snapshot = source.snapshot();

        let mut target = bootstrapped(24);
        target.restore(&snapshot).expect("restore");

        let expected = source.refresh_propensities();
        let restored = target.refresh_propensities();
        assert!((restored - expected).abs() < 1e-9);
    }

    #[test]
    fn mismatched_element_table_is_rejected() {
        let source = bootstrapped(25);
        let mut snapshot = source.snapshot();
        snapshot.element_amounts.push(1.0);

        let mut target = bootstrapped(26);
        assert!(matches!(
            target.restore(&snapshot),
            Err(CultureError::SnapshotMismatch(_))
        ));
    }

    #[test]
    fn member_lists_must_cover_every_cell_exactly_once() {
        let mut source = bootstrapped(29);
        for _ in 0..10 {
            source.step();
        }
        let mut snapshot = source.snapshot();
        assert!(snapshot.cells.len() > 1);
        let dropped = snapshot.colonies[0].members.pop().expect("populated colony");

        // a cell covered by no member list restores nothing
        let mut target = bootstrapped(30);
        assert!(matches!(
            target.restore(&snapshot),
            Err(CultureError::SnapshotMismatch(_))
        ));
        assert_eq!(target.cells().len(), 1);

        // the same cell listed twice is just as malformed
        snapshot.colonies[0].members.push(dropped);
        snapshot.colonies[0].members.push(dropped);
        assert!(matches!(
            target.restore(&snapshot),
            Err(CultureError::SnapshotMismatch(_))
        ));
        assert_eq!(target.cells().len(), 1);

        snapshot.colonies[0].members.pop();
        target.restore(&snapshot).expect("repaired snapshot restores");
        assert_eq!(target.snapshot(), snapshot);
    }

    #[test]
    fn cell_colony_index_must_agree_with_the_member_lists() {
        let mut source = bootstrapped(31);
        source.spawn_spore((5.0, 5.0), 0.0, StateId(0));
        let mut snapshot = source.snapshot();
        snapshot.cells[0].colony = 1;
        snapshot.cells[1].colony = 0;

        let mut target = bootstrapped(32);
        assert!(matches!(
            target.restore(&snapshot),
            Err(CultureError::SnapshotMismatch(_))
        ));
        assert_eq!(target.cells().len(), 1);
    }

    #[test]
    fn undefined_state_reference_is_rejected() {
        let source = bootstrapped(27);
        let mut snapshot = source.snapshot();
        snapshot.cells[0].state = 99;

        let mut target = bootstrapped(28);
        assert!(target.restore(&snapshot).is_err());
        // rejected before any mutation
        assert_eq!(target.cells().len(), 1);
    }
}
