//! Seeded synthetic game used to exercise the tracker end to end.
//!
//! The simulator owns the hidden truth the tracker is trying to recover:
//! three vent values drifting under the game's movement rules, a random
//! visibility schedule, and periodic stability updates obscured by seeded
//! modifiers. Every observation is fed to the tracker exactly as a game
//! client would report it, and each estimate is probed against the truth.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ventwatch_core::{
    in_freeze_band, stability_delta, Command, DirectionMask, DisplayState, Event,
    InferenceConfig, VentId, VentReading, BASE_MOVE_RATE, MAX_VENT_VALUE, MIN_VENT_VALUE,
    MOVEMENT_TICK_PERIOD, RESET_VALUE_HIGH, RESET_VALUE_LOW, STABILITY_UPDATE_PERIOD,
};
use ventwatch_tracker::{apply, query, VentTracker};

use crate::session::{RecordedTick, SessionRecording};

/// Chance per hidden tick that a vent becomes individually visible.
const REVEAL_CHANCE: f64 = 0.12;

/// Bounds on how many ticks a reveal window stays open.
const REVEAL_WINDOW: (u32, u32) = (2, 8);

/// Counters accumulated while driving the tracker through a simulated game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SimulationSummary {
    /// Stability updates delivered to the tracker.
    pub(crate) updates: u32,
    /// Vents that became individually visible, counted per identification.
    pub(crate) identifications: u32,
    /// In-game vent resets delivered.
    pub(crate) resets: u32,
    /// Per-vent truth containment probes performed.
    pub(crate) containment_checks: u32,
    /// Probes where the estimate did not contain the hidden truth.
    pub(crate) containment_misses: u32,
}

/// Runs a seeded synthetic game against a fresh tracker.
///
/// Prints one line per stability update and returns the full observation
/// recording, the run counters and the final display payload.
pub(crate) fn run(
    seed: u64,
    ticks: u32,
    config: InferenceConfig,
    reset_at: Option<u32>,
) -> (SessionRecording, SimulationSummary, DisplayState) {
    let mut game = TrueGame::new(seed);
    let mut tracker = VentTracker::new(config);
    let mut events = Vec::new();
    apply(&mut tracker, Command::Configure { config }, &mut events);

    let mut recording = SessionRecording {
        team_size: config.team_size(),
        ticks: Vec::with_capacity(ticks as usize),
    };
    let mut summary = SimulationSummary {
        updates: 0,
        identifications: 0,
        resets: 0,
        containment_checks: 0,
        containment_misses: 0,
    };

    for tick in 1..=ticks {
        if tick % MOVEMENT_TICK_PERIOD == 0 {
            game.advance_movement();
        }
        let readings = game.sample_readings();
        let directions = game.direction_mask();
        let delta =
            (tick % STABILITY_UPDATE_PERIOD == 0).then(|| game.observe_raw_delta(config));
        let reset = reset_at == Some(tick);

        events.clear();
        apply(
            &mut tracker,
            Command::IngestTick {
                readings,
                directions,
            },
            &mut events,
        );
        if let Some(raw_delta) = delta {
            apply(
                &mut tracker,
                Command::IngestStabilityDelta { raw_delta },
                &mut events,
            );
            summary.updates += 1;
            println!(
                "raw {raw_delta:+} -> {}",
                crate::format_display(&query::display_state(&tracker))
            );
        }
        if reset {
            apply(&mut tracker, Command::ResetVents, &mut events);
            game.reroll_after_reset();
            summary.resets += 1;
        }

        summary.identifications += events
            .iter()
            .filter(|event| matches!(event, Event::VentIdentified { .. }))
            .count() as u32;

        let estimate = query::current_estimate(&tracker);
        for vent in VentId::ALL {
            summary.containment_checks += 1;
            if !estimate.vent(vent).allows(game.value_of(vent)) {
                summary.containment_misses += 1;
            }
        }

        recording.ticks.push(RecordedTick {
            readings,
            directions,
            delta,
            reset,
        });
    }

    let final_display = query::display_state(&tracker);
    (recording, summary, final_display)
}

/// Hidden game state the simulator evolves and the tracker never sees.
struct TrueGame {
    rng: ChaCha8Rng,
    values: [u8; 3],
    upward: [bool; 3],
    visible_for: [u32; 3],
}

impl TrueGame {
    fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut values = [0u8; 3];
        for slot in &mut values {
            *slot = rng.gen_range(MIN_VENT_VALUE..=MAX_VENT_VALUE);
        }
        let mut upward = [false; 3];
        for slot in &mut upward {
            *slot = rng.gen_bool(0.5);
        }
        Self {
            rng,
            values,
            upward,
            visible_for: [0; 3],
        }
    }

    fn value_of(&self, vent: VentId) -> u8 {
        self.values[vent.index()]
    }

    /// Moves every vent by its banded displacement, bouncing at the domain
    /// edges by flipping direction before the move.
    ///
    /// Displacements are computed against the pre-movement values for all
    /// vents, matching how the game applies its periodic movement.
    fn advance_movement(&mut self) {
        let displacements = [
            self.displacement(VentId::A),
            self.displacement(VentId::B),
            self.displacement(VentId::C),
        ];
        for vent in VentId::ALL {
            let index = vent.index();
            let step = displacements[index];
            if step == 0 {
                continue;
            }
            if self.upward[index] {
                if self.values[index] > MAX_VENT_VALUE - step {
                    self.upward[index] = false;
                }
            } else if self.values[index] < step {
                self.upward[index] = true;
            }
            if self.upward[index] {
                self.values[index] += step;
            } else {
                self.values[index] -= step;
            }
        }
    }

    fn displacement(&self, vent: VentId) -> u8 {
        let own = i32::from(in_freeze_band(self.values[vent.index()]));
        let outside = i32::from(
            vent.influencers()
                .iter()
                .any(|v| in_freeze_band(self.values[v.index()])),
        );
        (i32::from(BASE_MOVE_RATE) - own - outside).max(0) as u8
    }

    /// Samples post-movement readings under the visibility schedule.
    fn sample_readings(&mut self) -> [VentReading; 3] {
        let mut readings = [VentReading::Hidden; 3];
        for vent in VentId::ALL {
            let index = vent.index();
            if self.visible_for[index] == 0 && self.rng.gen_bool(REVEAL_CHANCE) {
                self.visible_for[index] = self.rng.gen_range(REVEAL_WINDOW.0..=REVEAL_WINDOW.1);
            }
            if self.visible_for[index] > 0 {
                self.visible_for[index] -= 1;
                readings[index] = VentReading::Visible(self.values[index]);
            }
        }
        readings
    }

    fn direction_mask(&self) -> DirectionMask {
        let mut mask = DirectionMask::from_bits(0);
        for vent in VentId::ALL {
            if self.upward[vent.index()] {
                mask = mask.with_upward(vent);
            }
        }
        mask
    }

    fn observe_raw_delta(&mut self, config: InferenceConfig) -> i32 {
        let modifier = -self.rng.gen_range(0..=i32::from(config.team_size()) + 1);
        stability_delta(self.values) + modifier
    }

    /// Re-rolls every vent inside the reset window and hides them all.
    ///
    /// Movement directions survive a reset.
    fn reroll_after_reset(&mut self) {
        for slot in &mut self.values {
            *slot = self.rng.gen_range(RESET_VALUE_LOW..=RESET_VALUE_HIGH);
        }
        self.visible_for = [0; 3];
    }
}
