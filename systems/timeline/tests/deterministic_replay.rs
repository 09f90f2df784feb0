//! Replays a scripted season twice and checks that the walk is fully
//! deterministic, then pins the estimate the season should settle on.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ventwatch_core::{GameTick, InferenceConfig, MoveDirection, RevealOutcome, StepPattern, VentId};
use ventwatch_system_delta_resolver::NarrowOutcome;
use ventwatch_system_timeline::{EventTimeline, ReplayOutcome, RevealRecord};

#[test]
fn identical_scripts_replay_identically() {
    let first = run_season();
    let second = run_season();

    assert_eq!(first, second, "timeline replay diverged across identical runs");

    let (first_print, second_print) = (first.fingerprint(), second.fingerprint());
    assert_eq!(
        first_print, second_print,
        "fingerprint mismatch: {first_print:#x} vs {second_print:#x}"
    );
}

#[test]
fn the_season_settles_on_a_pinned_estimate() {
    let outcome = run_season();

    // Two pinned zero-modifier updates and quiet movements leave vent A
    // exactly at the domain midpoint and its siblings revealed there.
    assert_eq!(
        outcome.vents,
        vec![
            SeasonVent {
                actual: None,
                lower: Some((50, 50)),
                upper: Some((50, 50)),
                heading: 0,
            },
            SeasonVent {
                actual: Some(50),
                lower: Some((50, 50)),
                upper: Some((50, 50)),
                heading: 1,
            },
            SeasonVent {
                actual: Some(50),
                lower: Some((50, 50)),
                upper: Some((50, 50)),
                heading: 1,
            },
        ]
    );
    assert_eq!(outcome.predicted, Some((25, 25)));
    assert_eq!(outcome.notices, 0);
}

/// Summary of one scripted season, reduced to hashable plain data.
#[derive(Debug, PartialEq, Eq)]
struct SeasonOutcome {
    vents: Vec<SeasonVent>,
    predicted: Option<(i32, i32)>,
    notices: usize,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct SeasonVent {
    actual: Option<u8>,
    lower: Option<(u8, u8)>,
    upper: Option<(u8, u8)>,
    heading: i32,
}

impl SeasonOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.vents.len().hash(&mut hasher);
        for vent in &self.vents {
            vent.hash(&mut hasher);
        }
        self.predicted.hash(&mut hasher);
        self.notices.hash(&mut hasher);
        hasher.finish()
    }
}

fn run_season() -> SeasonOutcome {
    let mut timeline = EventTimeline::new(InferenceConfig::new(1));

    assert!(timeline.record_reveal(GameTick::new(2), VentId::B, sighting(50)));
    assert!(timeline.record_reveal(GameTick::new(2), VentId::C, sighting(50)));

    let candidate = timeline.replay(GameTick::new(5)).estimate;
    let first_pin = timeline.record_aggregate_delta(GameTick::new(5), 25, candidate);
    assert_eq!(first_pin, NarrowOutcome::Pinned(0));

    let quiet = StepPattern::empty()
        .with_step(VentId::B, 0)
        .with_step(VentId::C, 0);
    assert!(timeline.record_movement(GameTick::new(10), quiet));

    assert!(timeline.record_movement(GameTick::new(20), quiet));
    assert!(timeline.record_reveal(GameTick::new(20), VentId::B, steady(50)));
    assert!(timeline.record_reveal(GameTick::new(20), VentId::C, steady(50)));

    let candidate = timeline.replay(GameTick::new(25)).estimate;
    let second_pin = timeline.record_aggregate_delta(GameTick::new(25), 25, candidate);
    assert_eq!(second_pin, NarrowOutcome::Pinned(0));

    summarize(&timeline.replay(GameTick::new(26)))
}

fn summarize(outcome: &ReplayOutcome) -> SeasonOutcome {
    let mut vents = Vec::new();
    for vent in VentId::ALL {
        let estimate = outcome.estimate.vent(vent);
        vents.push(SeasonVent {
            actual: estimate.actual(),
            lower: estimate.lower().map(|piece| (piece.start(), piece.end())),
            upper: estimate.upper().map(|piece| (piece.start(), piece.end())),
            heading: estimate.direction().signum(),
        });
    }
    SeasonOutcome {
        vents,
        predicted: outcome
            .estimate
            .predicted_delta_bounds()
            .map(|bounds| (bounds.low(), bounds.high())),
        notices: outcome.notices.len(),
    }
}

fn sighting(value: u8) -> RevealRecord {
    RevealRecord {
        value,
        direction: MoveDirection::Up,
        outcome: RevealOutcome::FirstSighting,
    }
}

fn steady(value: u8) -> RevealRecord {
    RevealRecord {
        value,
        direction: MoveDirection::Up,
        outcome: RevealOutcome::Unchanged,
    }
}
