//! Discrete molecular pools and the mass-action reactions that drive events.

use serde::{Deserialize, Serialize};

/// Stable index of an [`Element`] in the culture's element table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ElementId(pub usize);

/// Stable index of a [`Reaction`] in the culture's reaction table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReactionId(pub usize);

/// A named molecular pool. Created once at bootstrap, never destroyed;
/// the amount is mutated only by [`Reaction::react`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Element {
    pub name: String,
    pub symbol: String,
    pub amount: f64,
}

impl Element {
    /// Construct a pool with an initial molecule count.
    #[must_use]
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            amount,
        }
    }
}

/// A reaction channel: rate constant plus reactant/product stoichiometry.
///
/// The cached propensity is `rate × h`, where `h` is the number of distinct
/// reactant combinations, recomputed once per driver tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    pub name: String,
    pub rate: f64,
    pub reactants: Vec<(ElementId, u32)>,
    pub products: Vec<(ElementId, u32)>,
    propensity: f64,
}

impl Reaction {
    /// Construct a reaction channel with zero cached propensity.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        rate: f64,
        reactants: Vec<(ElementId, u32)>,
        products: Vec<(ElementId, u32)>,
    ) -> Self {
        Self {
            name: name.into(),
            rate,
            reactants,
            products,
            propensity: 0.0,
        }
    }

    /// Cached propensity from the most recent [`Self::calc_propensity`] call.
    #[must_use]
    pub fn propensity(&self) -> f64 {
        self.propensity
    }

    /// Recompute the cached propensity from the current element amounts.
    pub fn calc_propensity(&mut self, elements: &[Element]) {
        self.propensity = self.rate * self.reactorial_count(elements);
    }

    /// Number of distinct ordered combinations of the reactant molecules:
    /// per species a falling factorial over its coefficient's factorial,
    /// multiplied across species.
    fn reactorial_count(&self, elements: &[Element]) -> f64 {
        let mut combinations = 1.0;
        for &(element, coefficient) in &self.reactants {
            let amount = elements[element.0].amount;
            combinations *= match coefficient {
                0 => 1.0,
                1 => amount,
                2 => amount * (amount - 1.0) / 2.0,
                c => {
                    let mut falling = 1.0;
                    for k in 0..c {
                        falling *= amount - f64::from(k);
                    }
                    falling / factorial(c)
                }
            };
        }
        combinations.max(0.0)
    }

    /// Apply the stoichiometry: decrement each reactant, increment each
    /// product. Executed exactly once per firing, synchronously.
    pub fn react(&self, elements: &mut [Element]) {
        for &(element, coefficient) in &self.reactants {
            elements[element.0].amount -= f64::from(coefficient);
        }
        for &(element, coefficient) in &self.products {
            elements[element.0].amount += f64::from(coefficient);
        }
    }
}

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}
