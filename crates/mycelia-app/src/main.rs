//! Command-line runner: bootstraps the reference germ-tube scenario (spores
//! sprouting two germ tubes, apical growth, polarity-driven tip splitting
//! and lateral branching) and drives it to a halt with periodic progress
//! logging.

use anyhow::{Context, Result};
use mycelia_core::{
    Action, Condition, Culture, CultureConfig, Element, ElementId, Event, GrowAction, HaltReason,
    PairAction, Reaction, ResponseKind, SourceColumn, State, TickObserver, TickReport,
};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use std::f64::consts::TAU;
use std::fs::File;
use std::io::BufWriter;
use tracing::{info, warn};

const DEFAULT_SPORES: usize = 20;
const DEFAULT_END_TIME: f64 = 48.0;
const DEFAULT_REPORT_INTERVAL: f64 = 6.0;

const STARCH_AMOUNT: f64 = 1e6;
const GROWTH_SPEED: f64 = 10.0;
const SEGMENT_LENGTH: f64 = 1.0;

const INITIAL_SPROUT_POLARITY: f64 = 1.0;
const SPLIT_THRESHOLD: f64 = 1.1;
const SPLIT_SENSITIVITY: f64 = 1.0;
const SPLIT_RATIO: f64 = 0.8;
const BRANCH_SPROUT_THRESHOLD: f64 = 1.0;
const BRANCH_SPROUT_SENSITIVITY: f64 = 1.0;

fn main() -> Result<()> {
    init_tracing();

    let seed: u64 = env_or("MYCELIA_SEED", rand::random());
    let spores: usize = env_or("MYCELIA_SPORES", DEFAULT_SPORES);
    let end_time: f64 = env_or("MYCELIA_END_TIME", DEFAULT_END_TIME);
    let interval: f64 = env_or("MYCELIA_REPORT_INTERVAL", DEFAULT_REPORT_INTERVAL);

    let (mut culture, nutrient) = bootstrap_culture(seed, spores, end_time)?;
    info!(
        seed,
        spores,
        end_time,
        partition_size = culture.config().partition_size().ok(),
        "starting mycelia culture"
    );

    let mut logger = PeriodicLogger::new(interval, nutrient);
    let reason = culture.run(&mut logger);

    info!(
        ?reason,
        time = culture.time(),
        fired = culture.fired_count(),
        cells = culture.cells().len(),
        colonies = culture.colonies().len(),
        nutrient = culture.element_amount(nutrient),
        "simulation finished"
    );

    if let Ok(path) = std::env::var("MYCELIA_SNAPSHOT_PATH") {
        let file = File::create(&path).with_context(|| format!("creating {path}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &culture.snapshot())
            .context("serializing snapshot")?;
        info!(path = %path, "snapshot written");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(name, raw = %raw, "unparseable override, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// The reference scenario: one starch pool consumed by every growth event;
/// spores sprout two opposed germ tubes, tips extend apically handing their
/// polarity focus forward, and a crossed polarity threshold splits the
/// focus to sprout a lateral branch at 90°.
fn bootstrap_culture(seed: u64, spores: usize, end_time: f64) -> Result<(Culture, ElementId)> {
    let config = CultureConfig {
        end_time,
        rng_seed: Some(seed),
        segment_length: SEGMENT_LENGTH,
        ..CultureConfig::default()
    };
    let mut culture = Culture::new(config)?;

    let starch = culture.add_element(Element::new("Starch", "S", STARCH_AMOUNT));
    // rate chosen so one saturated cell fires at the configured growth speed
    let consume = culture.add_reaction(Reaction::new(
        "consume nutrients",
        GROWTH_SPEED / SEGMENT_LENGTH / STARCH_AMOUNT,
        vec![(starch, 1)],
        Vec::new(),
    ));

    let germ_tube_1 = culture.add_state(State::new("spore germ tube 1"));
    let germ_tube_2 = culture.add_state(State::new("spore germ tube 2"));
    let straight = culture.add_state(State::new("straight"));
    let lateral = culture.add_state(State::new("lateral"));
    let dormant = culture.add_state(State::new("dormant"));

    let crowding = culture.add_condition(Condition::crowding("crowding index"));
    let split_focus = culture.add_condition(Condition::new(
        "split polarity threshold",
        ResponseKind::Linear,
        SourceColumn::Polarity,
        SPLIT_THRESHOLD,
        SPLIT_SENSITIVITY,
    ));
    let branch_sprout = culture.add_condition(Condition::new(
        "sprout branch",
        ResponseKind::Linear,
        SourceColumn::Polarity,
        BRANCH_SPROUT_THRESHOLD,
        BRANCH_SPROUT_SENSITIVITY,
    ));

    let germ_tube = |bend: f64| {
        Action::Grow(GrowAction {
            length: SEGMENT_LENGTH,
            bend,
            parent_actions: Vec::new(),
            child_actions: vec![
                Action::SwitchState { target: straight },
                Action::AddPolarity {
                    amount: INITIAL_SPROUT_POLARITY,
                },
                Action::Crowding {
                    condition: crowding,
                },
            ],
            pair_actions: Vec::new(),
        })
    };
    let tip_growth = |bend: f64, transfer_ratio: f64| {
        Action::Grow(GrowAction {
            length: SEGMENT_LENGTH,
            bend,
            parent_actions: Vec::new(),
            child_actions: vec![
                Action::SwitchState { target: straight },
                Action::Crowding {
                    condition: crowding,
                },
            ],
            pair_actions: vec![PairAction::Transfer {
                ratio: transfer_ratio,
            }],
        })
    };

    culture.add_event(Event {
        name: "grow first germ tube".into(),
        ingoing: vec![germ_tube_1],
        outgoing: germ_tube_2,
        conditions: Vec::new(),
        action: germ_tube(0.0),
        reaction: consume,
    });
    culture.add_event(Event {
        name: "grow second germ tube".into(),
        ingoing: vec![germ_tube_2],
        outgoing: dormant,
        conditions: Vec::new(),
        action: germ_tube(180.0_f64.to_radians()),
        reaction: consume,
    });
    culture.add_event(Event {
        name: "grow from the tip".into(),
        ingoing: vec![straight],
        outgoing: dormant,
        conditions: vec![crowding],
        action: tip_growth(0.0, 1.0),
        reaction: consume,
    });
    culture.add_event(Event {
        name: "grow from the tip, splitting the polarity focus".into(),
        ingoing: vec![straight],
        outgoing: lateral,
        conditions: vec![crowding, split_focus],
        action: tip_growth(0.0, SPLIT_RATIO),
        reaction: consume,
    });
    culture.add_event(Event {
        name: "sprout a lateral branch".into(),
        ingoing: vec![lateral],
        outgoing: dormant,
        conditions: vec![crowding, branch_sprout],
        action: tip_growth(90.0_f64.to_radians(), 1.0),
        reaction: consume,
    });

    let mut directions = SmallRng::seed_from_u64(seed);
    for _ in 0..spores {
        let direction = directions.random_range(0.0..TAU);
        culture.spawn_spore((0.0, 0.0), direction, germ_tube_1);
    }
    Ok((culture, starch))
}

/// Logs a progress line roughly every `interval` simulated time units, and a
/// final line at the halt.
struct PeriodicLogger {
    interval: f64,
    next_report: f64,
    nutrient: ElementId,
}

impl PeriodicLogger {
    fn new(interval: f64, nutrient: ElementId) -> Self {
        Self {
            interval,
            next_report: interval,
            nutrient,
        }
    }
}

impl TickObserver for PeriodicLogger {
    fn on_tick(&mut self, culture: &Culture, report: &TickReport) {
        if report.time < self.next_report {
            return;
        }
        while self.next_report <= report.time {
            self.next_report += self.interval;
        }
        info!(
            time = report.time,
            fired = report.fired_count,
            total_propensity = report.total_propensity,
            cells = culture.cells().len(),
            colonies = culture.colonies().len(),
            nutrient = culture.element_amount(self.nutrient),
            "progress"
        );
    }

    fn on_halt(&mut self, culture: &Culture, reason: HaltReason) {
        let verdict = match reason {
            HaltReason::NoPropensity => "no reactions left",
            HaltReason::EndTimeReached => "end time reached",
        };
        info!(
            time = culture.time(),
            census = ?culture.state_census(),
            verdict,
            "halting"
        );
    }
}
