#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Ordered log of everything observed during a game, and deterministic
//! re-derivation of vent estimates from that log.
//!
//! The timeline never mutates estimates in place when an observation
//! arrives. It records the observation at its tick and re-derives the
//! current estimate by replaying the log from the last trusted point, so
//! late or out-of-order deliveries produce the same estimate as if every
//! observation had arrived on time.

mod replay;

pub use replay::{BacktrackReport, ReplayNotice, ReplayOutcome};

use ventwatch_core::{
    GameTick, InferenceConfig, MoveDirection, RevealOutcome, StepPattern, VentId, MAX_GAME_TICKS,
};
use ventwatch_system_delta_resolver::{DeltaAmbiguityResolver, NarrowOutcome};
use ventwatch_system_vent_model::StatusSnapshot;

/// One reveal observation for a vent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealRecord {
    /// Value the vent reported.
    pub value: u8,
    /// Movement direction reported alongside the value.
    pub direction: MoveDirection,
    /// How the value related to the estimate held when it arrived.
    pub outcome: RevealOutcome,
}

/// A recorded flip of one vent's movement direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectionShift {
    /// Direction previously on record.
    pub from: MoveDirection,
    /// Direction in effect from this tick on.
    pub to: MoveDirection,
}

/// Everything observed on a single game tick.
#[derive(Clone, Debug, Default, PartialEq)]
struct TickRecord {
    reveals: [Option<RevealRecord>; 3],
    hidden: [bool; 3],
    direction_changes: [Option<DirectionShift>; 3],
    movement: Option<StepPattern>,
    inferred_movement: bool,
    anomaly: bool,
    aggregate_delta: Option<i32>,
    contradiction_noted: bool,
}

/// Append-mostly observation log with deterministic replay.
///
/// Records are kept per tick in a dense table so a correction that lands on
/// an earlier tick simply overwrites its slot and invalidates the replay
/// cache; the next [`EventTimeline::replay`] walks forward again from the
/// epoch checkpoint and every later observation is re-applied in order.
#[derive(Clone, Debug)]
pub struct EventTimeline {
    config: InferenceConfig,
    checkpoint: GameTick,
    initial: StatusSnapshot,
    records: Vec<TickRecord>,
    resolvers: Vec<DeltaAmbiguityResolver>,
    identified_at: [Option<GameTick>; 3],
    cache: Option<ReplayCache>,
}

/// Branch state carried between incremental replays.
#[derive(Clone, Debug)]
struct ReplayCache {
    through: GameTick,
    branches: Vec<StatusSnapshot>,
    stall_run: u32,
}

impl EventTimeline {
    /// Creates an empty timeline for a fresh game.
    #[must_use]
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            checkpoint: GameTick::new(0),
            initial: StatusSnapshot::starting(),
            records: Vec::new(),
            resolvers: Vec::new(),
            identified_at: [None; 3],
            cache: None,
        }
    }

    /// Configuration the timeline was created with.
    #[must_use]
    pub const fn config(&self) -> InferenceConfig {
        self.config
    }

    /// Tick the current inference epoch starts from.
    #[must_use]
    pub const fn checkpoint(&self) -> GameTick {
        self.checkpoint
    }

    /// Tick on which `vent` was first revealed in this epoch, if any.
    #[must_use]
    pub fn identified_at(&self, vent: VentId) -> Option<GameTick> {
        self.identified_at[vent.index()]
    }

    /// Resolver state for the stability update recorded at `tick`.
    #[must_use]
    pub fn resolver_at(&self, tick: GameTick) -> Option<&DeltaAmbiguityResolver> {
        self.resolvers.iter().find(|resolver| resolver.tick() == tick)
    }

    /// Records a vent reveal and returns whether it was newly recorded.
    ///
    /// Re-deliveries for a tick that already holds a reveal of the same vent
    /// are ignored. The first reveal of a vent in an epoch also fixes its
    /// identification tick.
    pub fn record_reveal(&mut self, tick: GameTick, vent: VentId, record: RevealRecord) -> bool {
        let Some(slot) = self.record_mut(tick) else {
            return false;
        };
        if slot.reveals[vent.index()].is_some() {
            return false;
        }
        slot.reveals[vent.index()] = Some(record);
        if self.identified_at[vent.index()].is_none() {
            self.identified_at[vent.index()] = Some(tick);
        }
        self.invalidate_cache_at(tick);
        true
    }

    /// Records that `vent` stopped reporting its value on `tick`.
    pub fn record_hidden(&mut self, tick: GameTick, vent: VentId) {
        let Some(slot) = self.record_mut(tick) else {
            return;
        };
        if slot.hidden[vent.index()] {
            return;
        }
        slot.hidden[vent.index()] = true;
        self.invalidate_cache_at(tick);
    }

    /// Records a direction flip for `vent` on `tick`.
    pub fn record_direction_change(&mut self, tick: GameTick, vent: VentId, shift: DirectionShift) {
        let Some(slot) = self.record_mut(tick) else {
            return;
        };
        if slot.direction_changes[vent.index()] == Some(shift) {
            return;
        }
        slot.direction_changes[vent.index()] = Some(shift);
        self.invalidate_cache_at(tick);
    }

    /// Records an observed movement tick and returns whether the record
    /// changed.
    ///
    /// A second pattern for the same tick merges per vent, with the newer
    /// observation taking priority where both report a step.
    pub fn record_movement(&mut self, tick: GameTick, pattern: StepPattern) -> bool {
        let Some(slot) = self.record_mut(tick) else {
            return false;
        };
        let merged = match slot.movement {
            Some(existing) => merge_patterns(existing, pattern),
            None => pattern,
        };
        let changed = slot.movement != Some(merged);
        slot.movement = Some(merged);
        slot.inferred_movement = false;
        if changed {
            self.invalidate_cache_at(tick);
        }
        changed
    }

    /// Marks `tick` as a movement tick that was never directly observed.
    ///
    /// Inferred movement carries no step pattern; the replay advances every
    /// estimate at its full plausible rate. An observed movement recorded
    /// later for the same tick replaces the inference.
    pub fn record_inferred_movement(&mut self, tick: GameTick) -> bool {
        let Some(slot) = self.record_mut(tick) else {
            return false;
        };
        if slot.movement.is_some() || slot.inferred_movement {
            return false;
        }
        slot.inferred_movement = true;
        self.invalidate_cache_at(tick);
        true
    }

    /// Marks `tick` as anomalous, which suspends movement on that tick.
    pub fn record_anomaly(&mut self, tick: GameTick) {
        let Some(slot) = self.record_mut(tick) else {
            return;
        };
        if slot.anomaly {
            return;
        }
        slot.anomaly = true;
        self.invalidate_cache_at(tick);
    }

    /// Records a raw stability update and narrows its modifier candidates
    /// against `candidate`, the estimate held when the update arrived.
    ///
    /// A re-delivery for a tick that already has a resolver refreshes that
    /// resolver instead of creating a second one.
    pub fn record_aggregate_delta(
        &mut self,
        tick: GameTick,
        raw_delta: i32,
        candidate: StatusSnapshot,
    ) -> NarrowOutcome {
        let Some(slot) = self.record_mut(tick) else {
            return NarrowOutcome::Unchanged;
        };
        slot.aggregate_delta = Some(raw_delta);
        self.invalidate_cache_at(tick);
        if let Some(resolver) = self
            .resolvers
            .iter_mut()
            .find(|resolver| resolver.tick() == tick)
        {
            return resolver.refresh_candidate(candidate);
        }
        let mut resolver = DeltaAmbiguityResolver::new(tick, raw_delta, candidate, self.config);
        let outcome = resolver.narrow_by_invalid_points();
        self.resolvers.push(resolver);
        outcome
    }

    /// Restarts inference from an in-game vent reset at `tick`.
    ///
    /// Values are re-rolled by a reset, so records on and after the reset
    /// tick are cleared and estimates restart from the reset value band.
    /// Directions survive a reset and are carried into the new epoch.
    pub fn reset(&mut self, tick: GameTick, directions: [MoveDirection; 3]) {
        self.checkpoint = tick;
        self.initial = StatusSnapshot::after_reset(directions);
        self.resolvers.clear();
        self.identified_at = [None; 3];
        self.cache = None;
        let start = tick.index().min(self.records.len());
        for slot in self.records.iter_mut().skip(start) {
            *slot = TickRecord::default();
        }
    }

    fn record_mut(&mut self, tick: GameTick) -> Option<&mut TickRecord> {
        let index = tick.index();
        if index >= MAX_GAME_TICKS as usize {
            return None;
        }
        if self.records.len() <= index {
            self.records.resize_with(index + 1, TickRecord::default);
        }
        self.records.get_mut(index)
    }

    fn record_at(&self, tick: GameTick) -> TickRecord {
        self.records.get(tick.index()).cloned().unwrap_or_default()
    }

    fn invalidate_cache_at(&mut self, tick: GameTick) {
        if let Some(cache) = &self.cache {
            if tick.get() <= cache.through.get() {
                self.cache = None;
            }
        }
    }
}

fn merge_patterns(existing: StepPattern, update: StepPattern) -> StepPattern {
    let mut merged = StepPattern::empty();
    for vent in VentId::ALL {
        if let Some(step) = update.step_of(vent).or(existing.step_of(vent)) {
            merged = merged.with_step(vent, step);
        }
    }
    merged
}
