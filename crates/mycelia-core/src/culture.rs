//! The culture: one explicit context owning every definition table, the cell
//! arena, the colonies, and the per-cell matrices, plus the Gillespie driver
//! that advances them.
//!
//! Driver ticks alternate two phases. Refresh recomputes reaction
//! propensities, condition factors, and the masked cell×event propensity
//! matrix. Step samples the waiting time, advances continuous columns,
//! selects one weighted (cell, event) pair, and fires it. Randomness comes
//! from a single seedable generator with a fixed per-tick draw sequence, so
//! a fixed seed reproduces a run exactly.

use crate::action::{self, Action, GrowAction, PairAction};
use crate::cell::{CellId, CellStore, ColonyId};
use crate::chemistry::{Element, ElementId, Reaction, ReactionId};
use crate::colony::Colony;
use crate::condition::{self, Condition, ConditionId, ResponseKind, SourceColumn};
use crate::config::{CultureConfig, CultureError};
use crate::event::{Event, EventId, State, StateId};
use crate::store::GrowMatrix;
use mycelia_index::SpatialHash;
use rand::Rng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Exp, Normal};
use std::collections::HashSet;
use std::f64::consts::FRAC_PI_2;

/// Probe distance for sampling the crowding stimulus on either side of a
/// growing tip. Small enough that the two probe points straddle the tip
/// without reaching past the nearest neighbor.
const TROPISM_PROBE: f64 = 1e-6;

/// Why the driver stopped. Both are clean terminations, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The summed propensity matrix reached zero; nothing can fire again.
    NoPropensity,
    /// Simulated time advanced to or past the configured end time.
    EndTimeReached,
}

/// Result of one driver tick.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Fired(TickReport),
    Halted(HaltReason),
}

/// Per-tick record handed to observers after an event fires.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    /// Simulated time after the tick.
    pub time: f64,
    /// Waiting time sampled for this tick.
    pub tau: f64,
    /// Total propensity the selection was drawn from.
    pub total_propensity: f64,
    /// Cell the event fired on.
    pub cell: CellId,
    /// Event that fired.
    pub event: EventId,
    /// Running count of fired events, this tick included.
    pub fired_count: u64,
}

/// External per-tick hook: reporting and logging live behind this so the
/// driver carries no scheduling or output logic of its own.
pub trait TickObserver {
    /// Called once per completed tick, after the event has fired.
    fn on_tick(&mut self, _culture: &Culture, _report: &TickReport) {}

    /// Called exactly once, when the driver halts. A final flush point.
    fn on_halt(&mut self, _culture: &Culture, _reason: HaltReason) {}
}

/// Observer that ignores every notification.
pub struct NullObserver;

impl TickObserver for NullObserver {}

/// The whole simulation context. Construct one, populate the definition
/// tables, spawn spores, then [`Culture::run`] it to a halt.
#[derive(Debug)]
pub struct Culture {
    pub(crate) config: CultureConfig,
    pub(crate) partition_size: f64,
    pub(crate) rng: SmallRng,
    noise_dist: Normal<f64>,
    pub(crate) grid_prototype: SpatialHash,

    pub(crate) time: f64,
    pub(crate) fired_count: u64,

    pub(crate) elements: Vec<Element>,
    pub(crate) reactions: Vec<Reaction>,
    pub(crate) states: Vec<State>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) events: Vec<Event>,

    pub(crate) cells: CellStore,
    pub(crate) colonies: Vec<Colony>,

    /// state×event applicability bits (1.0 where the event's ingoing set
    /// contains the state).
    pub(crate) state_mask: GrowMatrix<f64>,
    /// cell×event copy of each cell's current state row.
    pub(crate) masks: GrowMatrix<f64>,
    /// cell×condition multiplicative factors.
    pub(crate) factors: GrowMatrix<f64>,
    /// cell×event assembled propensities, masked.
    pub(crate) propensities: GrowMatrix<f64>,
}

impl Culture {
    /// Validate the configuration and build an empty culture.
    pub fn new(config: CultureConfig) -> Result<Self, CultureError> {
        let partition_size = config.partition_size()?;
        let noise_dist = Normal::new(0.0, config.angle_noise_dev)
            .map_err(|_| CultureError::InvalidConfig("angle_noise_dev is not a valid deviation"))?;
        let grid_prototype = SpatialHash::new(partition_size)
            .map_err(|_| CultureError::InvalidConfig("derived partition size is not positive"))?;
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            partition_size,
            rng,
            noise_dist,
            grid_prototype,
            time: 0.0,
            fired_count: 0,
            elements: Vec::new(),
            reactions: Vec::new(),
            states: Vec::new(),
            conditions: Vec::new(),
            events: Vec::new(),
            cells: CellStore::new(),
            colonies: Vec::new(),
            state_mask: GrowMatrix::new(0),
            masks: GrowMatrix::new(0),
            factors: GrowMatrix::new(0),
            propensities: GrowMatrix::new(0),
        })
    }

    // ----- bootstrap -------------------------------------------------------

    /// Register a molecular pool.
    pub fn add_element(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(element);
        id
    }

    /// Register a reaction channel.
    pub fn add_reaction(&mut self, reaction: Reaction) -> ReactionId {
        let id = ReactionId(self.reactions.len());
        self.reactions.push(reaction);
        id
    }

    /// Register a biological state, widening the state×event mask.
    pub fn add_state(&mut self, state: State) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(state);
        self.state_mask.append_zero_row();
        id
    }

    /// Register a condition, widening the factor matrix. Static columns are
    /// seeded from the current crowding column; the rest are filled by the
    /// next refresh pass.
    pub fn add_condition(&mut self, condition: Condition) -> ConditionId {
        let id = ConditionId(self.conditions.len());
        let is_static = condition.kind == ResponseKind::Static;
        self.conditions.push(condition);
        self.factors.add_column();
        if is_static {
            let alpha = self.config.crowding.alpha;
            for row in 0..self.cells.len() {
                let factor = condition::crowding_factor(self.cells.crowding(CellId(row)), alpha);
                self.factors.set(row, id.0, factor);
            }
        }
        id
    }

    /// Register an event: set its ingoing bits in the state×event mask,
    /// widen the per-cell matrices, and re-derive every existing cell's mask
    /// row so bootstrap order (spores before or after events) cannot leave a
    /// stale row behind.
    pub fn add_event(&mut self, event: Event) -> EventId {
        let id = EventId(self.events.len());
        self.state_mask.add_column();
        for &state in &event.ingoing {
            self.state_mask.set(state.0, id.0, 1.0);
        }
        self.events.push(event);
        self.masks.add_column();
        self.propensities.add_column();

        let Self {
            state_mask,
            masks,
            cells,
            ..
        } = self;
        for row in 0..cells.len() {
            let state = cells.state(CellId(row));
            masks.row_mut(row).copy_from_slice(state_mask.row(state.0));
        }
        id
    }

    /// Create an unparented founder cell at `position` in its own fresh
    /// colony. Spores are point-like: center and tip coincide.
    pub fn spawn_spore(&mut self, position: (f64, f64), direction: f64, state: StateId) -> CellId {
        let cell = self
            .cells
            .create_cell(position, position, direction, 0.0, None, state);
        let colony_id = ColonyId(self.colonies.len());
        let mut colony = Colony::new(colony_id, cell, self.grid_prototype.clone());
        colony.add_cell(cell, &mut self.cells);
        self.colonies.push(colony);
        self.append_cell_rows(cell, state);
        cell
    }

    /// Append one zero row per per-cell matrix for a freshly created cell,
    /// then derive its mask row and seed static factor columns at 1.
    pub(crate) fn append_cell_rows(&mut self, cell: CellId, state: StateId) {
        let row = self.masks.append_zero_row();
        debug_assert_eq!(row, cell.0);
        self.factors.append_zero_row();
        self.propensities.append_zero_row();

        let Self {
            state_mask, masks, ..
        } = self;
        masks.row_mut(cell.0).copy_from_slice(state_mask.row(state.0));

        for (column, condition) in self.conditions.iter().enumerate() {
            if condition.kind == ResponseKind::Static {
                // zero accumulated crowding at birth
                self.factors.set(cell.0, column, 1.0);
            }
        }
    }

    // ----- read access -----------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &CultureConfig {
        &self.config
    }

    /// Simulated time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Total events fired so far.
    #[must_use]
    pub fn fired_count(&self) -> u64 {
        self.fired_count
    }

    #[must_use]
    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    #[must_use]
    pub fn colonies(&self) -> &[Colony] {
        &self.colonies
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Current amount of one molecular pool.
    #[must_use]
    pub fn element_amount(&self, element: ElementId) -> f64 {
        self.elements[element.0].amount
    }

    /// Cell counts per state, in state table order.
    #[must_use]
    pub fn state_census(&self) -> Vec<usize> {
        let mut counts = vec![0_usize; self.states.len()];
        for state in self.cells.states() {
            counts[state.0] += 1;
        }
        counts
    }

    // ----- driver ----------------------------------------------------------

    /// Refresh phase: reaction propensities, non-static condition factors,
    /// event columns, state mask. Returns the total propensity.
    pub fn refresh_propensities(&mut self) -> f64 {
        let Self {
            reactions,
            elements,
            conditions,
            cells,
            factors,
            events,
            propensities,
            masks,
            ..
        } = self;

        for reaction in reactions.iter_mut() {
            reaction.calc_propensity(elements);
        }

        for (column, condition) in conditions.iter().enumerate() {
            if condition.kind == ResponseKind::Static {
                continue;
            }
            let parameters = match condition.source {
                SourceColumn::Polarity => cells.polarity_column(),
                SourceColumn::Age => cells.ages(),
                SourceColumn::Crowding => cells.crowding_column(),
            };
            for (row, &parameter) in parameters.iter().enumerate() {
                factors.set(row, column, condition.response(parameter));
            }
        }

        for (column, event) in events.iter().enumerate() {
            let base = reactions[event.reaction.0].propensity();
            for row in 0..cells.len() {
                let mut value = base;
                for &condition in &event.conditions {
                    value *= factors.get(row, condition.0);
                }
                propensities.set(row, column, value);
            }
        }

        for (value, &mask) in propensities.values_mut().iter_mut().zip(masks.values()) {
            *value *= mask;
        }
        propensities.sum()
    }

    /// One driver tick: refresh, sample the waiting time, advance continuous
    /// columns, then select and fire one (cell, event) pair.
    pub fn step(&mut self) -> StepOutcome {
        let total = self.refresh_propensities();
        if total <= 0.0 {
            return StepOutcome::Halted(HaltReason::NoPropensity);
        }
        let Ok(waiting_time) = Exp::new(total) else {
            return StepOutcome::Halted(HaltReason::NoPropensity);
        };
        let tau = waiting_time.sample(&mut self.rng);
        self.time += tau;
        self.cells.advance_ages(tau);
        self.cells
            .advance_polarity(self.config.polarity_binding_rate, tau);
        if self.time >= self.config.end_time {
            return StepOutcome::Halted(HaltReason::EndTimeReached);
        }

        let target = self.rng.random_range(0.0..total);
        let (cell, event) = self.select_cell_event(target);
        self.fire(cell, event);
        self.fired_count += 1;

        StepOutcome::Fired(TickReport {
            time: self.time,
            tau,
            total_propensity: total,
            cell,
            event,
            fired_count: self.fired_count,
        })
    }

    /// Run ticks until a halt, notifying the observer per tick and once at
    /// the halt.
    pub fn run(&mut self, observer: &mut dyn TickObserver) -> HaltReason {
        loop {
            match self.step() {
                StepOutcome::Fired(report) => observer.on_tick(self, &report),
                StepOutcome::Halted(reason) => {
                    observer.on_halt(self, reason);
                    return reason;
                }
            }
        }
    }

    /// Standard SSA inverse-CDF selection: walk the flattened cell×event
    /// matrix accumulating a running sum and return the first pair whose
    /// cumulative sum exceeds `target`. Floating-point shortfall at the very
    /// end falls back to the last entry.
    fn select_cell_event(&self, target: f64) -> (CellId, EventId) {
        let values = self.propensities.values();
        let columns = self.propensities.cols();
        let mut cumulative = 0.0;
        let mut chosen = values.len() - 1;
        for (flat, &value) in values.iter().enumerate() {
            cumulative += value;
            if target < cumulative {
                chosen = flat;
                break;
            }
        }
        (CellId(chosen / columns), EventId(chosen % columns))
    }

    /// Execute one firing: reaction stoichiometry, then the action, then the
    /// state switch to the event's outgoing state.
    fn fire(&mut self, cell: CellId, event: EventId) {
        let definition = self.events[event.0].clone();
        self.reactions[definition.reaction.0].react(&mut self.elements);
        self.run_action(cell, &definition.action);
        self.switch_state(cell, definition.outgoing);
    }

    fn switch_state(&mut self, cell: CellId, state: StateId) {
        self.cells.set_state(cell, state);
        let Self {
            state_mask, masks, ..
        } = self;
        masks.row_mut(cell.0).copy_from_slice(state_mask.row(state.0));
    }

    // ----- actions ---------------------------------------------------------

    fn run_action(&mut self, cell: CellId, action: &Action) {
        match action {
            Action::None => {}
            Action::SwitchState { target } => self.switch_state(cell, *target),
            Action::Grow(grow) => self.grow_cell(cell, grow),
            Action::AddPolarity { amount } => self.cells.add_polarity(cell, *amount),
            Action::Crowding { condition } => self.apply_crowding(cell, *condition),
            Action::Fragment => self.fragment(cell),
        }
    }

    fn run_pair_action(&mut self, donor: CellId, recipient: CellId, action: &PairAction) {
        match action {
            PairAction::Transfer { ratio } => {
                let amount = ratio * self.cells.polarity(donor);
                self.cells.add_polarity(donor, -amount);
                self.cells.add_polarity(recipient, amount);
            }
        }
    }

    /// Sprout a new segment from `parent`'s tip.
    ///
    /// Draw order is fixed: angular noise, then the bend-sign coin. The new
    /// direction is `parent ± bend + noise + tropism`, projected with
    /// compass geometry (`dx = L·sin`, `dy = L·cos`).
    fn grow_cell(&mut self, parent: CellId, grow: &GrowAction) {
        let noise = self.noise_dist.sample(&mut self.rng);
        let bend_sign = if self.rng.random::<bool>() { 1.0 } else { -1.0 };
        let direction = self.cells.direction(parent)
            + bend_sign * grow.bend
            + noise
            + self.tropism_bend(parent);

        let tip = self.cells.end(parent);
        let dx = grow.length * direction.sin();
        let dy = grow.length * direction.cos();
        let end = (tip.0 + dx, tip.1 + dy);
        let center = (tip.0 + dx / 2.0, tip.1 + dy / 2.0);

        let state = self.cells.state(parent);
        let child = self
            .cells
            .create_cell(center, end, direction, grow.length, Some(parent), state);
        self.cells.link_child(parent, child);
        let colony = self.cells.colony(parent);
        self.colonies[colony.0].add_cell(child, &mut self.cells);
        self.append_cell_rows(child, state);

        for sub in &grow.parent_actions {
            self.run_action(parent, sub);
        }
        for sub in &grow.child_actions {
            self.run_action(child, sub);
        }
        for sub in &grow.pair_actions {
            self.run_pair_action(parent, child, sub);
        }
    }

    /// Directional bias away from the more crowded side of the tip: kernel
    /// sums are sampled at ±90° off the heading at an infinitesimal probe
    /// distance, and their normalized difference is squashed through tanh.
    fn tropism_bend(&self, parent: CellId) -> f64 {
        let tropism = self.config.tropism;
        if tropism.sensitivity == 0.0 || tropism.max_bend == 0.0 {
            return 0.0;
        }
        let tip = self.cells.end(parent);
        let direction = self.cells.direction(parent);
        let colony = self.cells.colony(parent);
        let left = self.stimulus_at(
            colony,
            offset_point(tip, direction + FRAC_PI_2, TROPISM_PROBE),
            parent,
        );
        let right = self.stimulus_at(
            colony,
            offset_point(tip, direction - FRAC_PI_2, TROPISM_PROBE),
            parent,
        );
        // positive bend turns counter-clockwise, away from a crowded left
        ((right - left) / TROPISM_PROBE * tropism.sensitivity).tanh() * tropism.max_bend
    }

    /// Crowding-kernel sum over colony members within the cutoff of `point`,
    /// excluding the probing cell itself.
    fn stimulus_at(&self, colony: ColonyId, point: (f64, f64), exclude: CellId) -> f64 {
        let crowding = self.config.crowding;
        self.neighbours_within_cutoff(colony, point)
            .into_iter()
            .filter(|&(id, _)| id != exclude)
            .map(|(_, distance)| {
                action::crowding_kernel(distance, crowding.steepness, crowding.spacing)
            })
            .sum()
    }

    /// Exact-filtered neighbor list: colony members whose centers lie within
    /// the crowding cutoff of `point`, with their distances. Squared
    /// comparison first; the square root is taken only for survivors.
    fn neighbours_within_cutoff(&self, colony: ColonyId, point: (f64, f64)) -> Vec<(CellId, f64)> {
        let cutoff_sq = self.partition_size * self.partition_size;
        let mut hits = Vec::new();
        for index in self.colonies[colony.0].neighbours(point) {
            let center = self.cells.center(CellId(index));
            let dx = center.0 - point.0;
            let dy = center.1 - point.1;
            let distance_sq = dx * dx + dy * dy;
            if distance_sq <= cutoff_sq {
                hits.push((CellId(index), distance_sq.sqrt()));
            }
        }
        hits
    }

    /// Accumulate symmetric crowding between `cell` and every in-range
    /// colony neighbor, then rewrite the given static condition's factor for
    /// all touched cells. Zero neighbors is fine; only the factor of `cell`
    /// itself gets (re)written.
    fn apply_crowding(&mut self, cell: CellId, condition: ConditionId) {
        let crowding = self.config.crowding;
        let point = self.cells.center(cell);
        let colony = self.cells.colony(cell);

        let mut touched = vec![cell];
        for (neighbour, distance) in self.neighbours_within_cutoff(colony, point) {
            if neighbour == cell {
                continue;
            }
            let kernel = action::crowding_kernel(distance, crowding.steepness, crowding.spacing);
            self.cells.add_crowding(cell, kernel);
            self.cells.add_crowding(neighbour, kernel);
            touched.push(neighbour);
        }
        for touched_cell in touched {
            let factor =
                condition::crowding_factor(self.cells.crowding(touched_cell), crowding.alpha);
            self.factors.set(touched_cell.0, condition.0, factor);
        }
    }

    /// Detach `cell`'s subtree into a new colony. A root cell has nothing to
    /// detach from; the action is a no-op there.
    fn fragment(&mut self, cell: CellId) {
        let Some(parent) = self.cells.parent(cell) else {
            return;
        };
        self.cells.unlink_child(parent, cell);
        self.cells.set_parent(cell, None);
        let branch = self.cells.collect_subtree(cell);
        let old_colony = self.cells.colony(cell);

        // Crowding between branch and non-branch members must be undone
        // while the branch is still queryable in the old grid.
        self.remove_branch_crowding(old_colony, &branch);
        self.colonies[old_colony.0].remove_branch(&branch, &self.cells);

        let new_id = ColonyId(self.colonies.len());
        let mut colony = Colony::new(new_id, cell, self.grid_prototype.clone());
        colony.add_branch(&branch, &mut self.cells);
        self.colonies.push(colony);
    }

    /// Subtract the pairwise crowding between branch cells and colony
    /// members outside the branch, symmetrically, then rewrite every static
    /// condition factor for the touched cells. Intra-branch crowding stays:
    /// those cells leave together.
    fn remove_branch_crowding(&mut self, colony: ColonyId, branch: &[CellId]) {
        let crowding = self.config.crowding;
        let in_branch: HashSet<CellId> = branch.iter().copied().collect();
        let mut touched: HashSet<CellId> = HashSet::new();

        for &member in branch {
            let point = self.cells.center(member);
            for (neighbour, distance) in self.neighbours_within_cutoff(colony, point) {
                if in_branch.contains(&neighbour) {
                    continue;
                }
                let kernel =
                    action::crowding_kernel(distance, crowding.steepness, crowding.spacing);
                self.cells.add_crowding(member, -kernel);
                self.cells.add_crowding(neighbour, -kernel);
                touched.insert(member);
                touched.insert(neighbour);
            }
        }

        for cell in touched {
            let factor = condition::crowding_factor(self.cells.crowding(cell), crowding.alpha);
            for (column, condition) in self.conditions.iter().enumerate() {
                if condition.kind == ResponseKind::Static {
                    self.factors.set(cell.0, column, factor);
                }
            }
        }
    }
}

fn offset_point(origin: (f64, f64), direction: f64, distance: f64) -> (f64, f64) {
    (
        origin.0 + distance * direction.sin(),
        origin.1 + distance * direction.cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config(seed: u64) -> CultureConfig {
        CultureConfig {
            rng_seed: Some(seed),
            ..CultureConfig::default()
        }
    }

    fn culture(seed: u64) -> Culture {
        Culture::new(seeded_config(seed)).expect("valid config")
    }

    /// One state, one nutrient pool, one self-looping event.
    fn single_channel(seed: u64, amount: f64, action: Action) -> (Culture, ElementId, StateId) {
        let mut culture = culture(seed);
        let nutrient = culture.add_element(Element::new("Starch", "S", amount));
        let reaction = culture.add_reaction(Reaction::new(
            "consume",
            1.0,
            vec![(nutrient, 1)],
            Vec::new(),
        ));
        let tip = culture.add_state(State::new("tip"));
        culture.add_event(Event {
            name: "grow".into(),
            ingoing: vec![tip],
            outgoing: tip,
            conditions: Vec::new(),
            action,
            reaction,
        });
        (culture, nutrient, tip)
    }

    #[test]
    fn masking_zeroes_events_outside_ingoing_states() {
        let (mut culture, _, tip) = single_channel(1, 10.0, Action::None);
        let dormant = culture.add_state(State::new("dormant"));
        culture.spawn_spore((0.0, 0.0), 0.0, tip);
        culture.spawn_spore((5.0, 5.0), 0.0, dormant);

        let total = culture.refresh_propensities();
        assert!((total - 10.0).abs() < 1e-9);
        assert!((culture.propensities.get(0, 0) - 10.0).abs() < 1e-9);
        assert_eq!(culture.propensities.get(1, 0), 0.0);
    }

    #[test]
    fn total_propensity_matches_matrix_sum() {
        let (mut culture, _, tip) = single_channel(2, 10.0, Action::None);
        let reaction = culture.events[0].reaction;
        let half = culture.add_condition(Condition::new(
            "half",
            ResponseKind::Constant,
            SourceColumn::Age,
            0.0,
            0.5,
        ));
        culture.add_event(Event {
            name: "slow".into(),
            ingoing: vec![tip],
            outgoing: tip,
            conditions: vec![half],
            action: Action::None,
            reaction,
        });
        culture.spawn_spore((0.0, 0.0), 0.0, tip);
        culture.spawn_spore((3.0, 0.0), 0.0, tip);

        let total = culture.refresh_propensities();
        // two cells × (10 + 10·0.5)
        assert!((total - 30.0).abs() < 1e-9);
        assert!((total - culture.propensities.sum()).abs() < 1e-9);
    }

    #[test]
    fn weighted_selection_converges_to_propensity_ratios() {
        let mut culture = culture(3);
        let mut matrix = GrowMatrix::new(2);
        matrix.append_row(&[1.0, 2.0]);
        matrix.append_row(&[3.0, 4.0]);
        culture.propensities = matrix;
        let total = 10.0;

        let samples = 100_000_u32;
        let mut counts = [[0_u32; 2]; 2];
        for _ in 0..samples {
            let target = culture.rng.random_range(0.0..total);
            let (cell, event) = culture.select_cell_event(target);
            counts[cell.0][event.0] += 1;
        }
        for cell in 0..2 {
            for event in 0..2 {
                let expected = culture.propensities.get(cell, event) / total;
                let observed = f64::from(counts[cell][event]) / f64::from(samples);
                assert!(
                    (observed - expected).abs() < 0.01,
                    "({cell},{event}): observed {observed}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn growth_event_creates_a_linked_attached_cell() {
        let (mut culture, nutrient, tip) =
            single_channel(4, 1000.0, Action::Grow(GrowAction::straight(1.0)));
        let root = culture.spawn_spore((0.0, 0.0), 0.0, tip);

        let StepOutcome::Fired(report) = culture.step() else {
            panic!("expected a firing");
        };
        assert_eq!(report.fired_count, 1);
        assert!(report.time > 0.0);

        assert_eq!(culture.cells().len(), 2);
        let child = CellId(1);
        assert_eq!(culture.cells().parent(child), Some(root));
        assert_eq!(culture.cells().children(root), &[child]);
        assert_eq!(culture.colonies()[0].cell_count(), 2);
        assert!((culture.element_amount(nutrient) - 999.0).abs() < 1e-9);

        let end = culture.cells().end(child);
        let segment = (end.0 * end.0 + end.1 * end.1).sqrt();
        assert!((segment - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tropism_bends_away_from_the_crowded_left_side() {
        let mut config = seeded_config(14);
        config.tropism.sensitivity = 1.0;
        let mut culture = Culture::new(config).expect("valid config");
        let tip = culture.add_state(State::new("tip"));
        let root = culture.spawn_spore((0.0, 0.0), 0.0, tip);

        // heading due north, the left sampler looks east toward the
        // neighbor, so the bend must be clockwise (negative)
        let neighbour = culture
            .cells
            .create_cell((1.0, 0.0), (1.0, 0.0), 0.0, 0.0, None, tip);
        culture.append_cell_rows(neighbour, tip);
        culture.colonies[0].add_cell(neighbour, &mut culture.cells);

        let max_bend = culture.config.tropism.max_bend;
        let bend = culture.tropism_bend(root);
        assert!(bend < 0.0, "expected a clockwise bend, got {bend}");
        assert!(bend.abs() < max_bend);

        // a huge sensitivity saturates the tanh at the maximum bend
        culture.config.tropism.sensitivity = 1e12;
        let saturated = culture.tropism_bend(root);
        assert!((saturated + max_bend).abs() < 1e-12);
    }

    #[test]
    fn fragmentation_partitions_cells_across_colonies() {
        let (mut culture, _, tip) = single_channel(5, 1000.0, Action::None);
        let root = culture.spawn_spore((0.0, 0.0), 0.0, tip);
        let grow = Action::Grow(GrowAction::straight(1.0));
        culture.run_action(root, &grow);
        let middle = CellId(1);
        culture.run_action(middle, &grow);

        culture.run_action(middle, &Action::Fragment);

        assert_eq!(culture.colonies().len(), 2);
        assert_eq!(culture.colonies()[0].members(), &[root.0]);
        let mut detached = culture.colonies()[1].members().to_vec();
        detached.sort_unstable();
        assert_eq!(detached, vec![1, 2]);
        assert_eq!(culture.cells().parent(middle), None);
        assert!(culture.cells().children(root).is_empty());
        assert_eq!(culture.cells().colony(middle), ColonyId(1));

        // every cell in exactly one colony, union covers the population
        let mut seen: Vec<usize> = culture
            .colonies()
            .iter()
            .flat_map(|colony| colony.members().iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn transfer_splits_polarity_between_parent_and_child() {
        let (mut culture, _, tip) = single_channel(6, 1000.0, Action::None);
        let root = culture.spawn_spore((0.0, 0.0), 0.0, tip);
        culture.cells.add_polarity(root, 8.0);

        let grow = Action::Grow(GrowAction {
            length: 1.0,
            bend: 0.0,
            parent_actions: Vec::new(),
            child_actions: Vec::new(),
            pair_actions: vec![PairAction::Transfer { ratio: 0.25 }],
        });
        culture.run_action(root, &grow);

        assert!((culture.cells().polarity(root) - 6.0).abs() < 1e-12);
        assert!((culture.cells().polarity(CellId(1)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn crowding_action_is_symmetric_and_rewrites_the_factor() {
        let (mut culture, _, tip) = single_channel(7, 1000.0, Action::None);
        let condition = culture.add_condition(Condition::crowding("crowded"));
        let root = culture.spawn_spore((0.0, 0.0), 0.0, tip);
        culture.run_action(root, &Action::Grow(GrowAction::straight(1.0)));
        let child = CellId(1);

        culture.run_action(child, &Action::Crowding { condition });

        let accumulated = culture.cells().crowding(child);
        assert!(accumulated > 0.0);
        assert!((culture.cells().crowding(root) - accumulated).abs() < 1e-12);

        let expected = condition::crowding_factor(accumulated, culture.config.crowding.alpha);
        assert!((culture.factors.get(child.0, condition.0) - expected).abs() < 1e-12);
        assert!((culture.factors.get(root.0, condition.0) - expected).abs() < 1e-12);
        assert!(expected < 1.0);
    }

    #[test]
    fn fragmenting_a_root_is_a_no_op() {
        let (mut culture, _, tip) = single_channel(8, 1000.0, Action::None);
        let root = culture.spawn_spore((0.0, 0.0), 0.0, tip);
        culture.run_action(root, &Action::Fragment);
        assert_eq!(culture.colonies().len(), 1);
        assert_eq!(culture.cells().colony(root), ColonyId(0));
    }

    #[test]
    fn empty_culture_halts_with_no_propensity() {
        let mut culture = culture(9);
        let reason = culture.run(&mut NullObserver);
        assert_eq!(reason, HaltReason::NoPropensity);
        assert_eq!(culture.fired_count(), 0);
    }

    #[test]
    fn end_time_halts_before_firing() {
        let (mut culture, nutrient, tip) = single_channel(10, 10.0, Action::None);
        culture.config.end_time = 1e-9;
        culture.spawn_spore((0.0, 0.0), 0.0, tip);

        let reason = culture.run(&mut NullObserver);
        assert_eq!(reason, HaltReason::EndTimeReached);
        assert!(culture.time() >= 1e-9);
        // the halting tick advances time but never fires
        assert!((culture.element_amount(nutrient) - 10.0).abs() < 1e-12);
        assert_eq!(culture.fired_count(), 0);
    }

    #[test]
    fn fixed_seed_reproduces_the_run() {
        let run = |seed: u64| {
            let (mut culture, nutrient, tip) =
                single_channel(seed, 50.0, Action::Grow(GrowAction::straight(1.0)));
            culture.spawn_spore((0.0, 0.0), 0.0, tip);
            culture.run(&mut NullObserver);
            let tips: Vec<(f64, f64)> = (0..culture.cells().len())
                .map(|index| culture.cells().end(CellId(index)))
                .collect();
            (culture.time(), culture.element_amount(nutrient), tips)
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn state_census_counts_cells_per_state() {
        let (mut culture, _, tip) = single_channel(12, 10.0, Action::None);
        let dormant = culture.add_state(State::new("dormant"));
        culture.spawn_spore((0.0, 0.0), 0.0, tip);
        culture.spawn_spore((1.0, 0.0), 0.0, tip);
        culture.spawn_spore((2.0, 0.0), 0.0, dormant);
        assert_eq!(culture.state_census(), vec![2, 1]);
    }
}
