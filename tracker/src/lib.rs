#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative inference state for the vent status tracker.
//!
//! The tracker owns the observation timeline and turns client commands into
//! recorded observations, broadcast events and a refreshed operator-facing
//! estimate. All inference happens in the systems crates; this crate
//! sequences them and keeps the latest derived state queryable.

use ventwatch_core::{
    in_freeze_band, Command, DiscardReason, DisplayState, Event, GameTick, InferenceConfig,
    MoveDirection, StepPattern, VentDisplay, VentEstimate, VentId, VentReading, BASE_MOVE_RATE,
    MOVEMENT_TICK_PERIOD,
};
use ventwatch_system_delta_resolver::NarrowOutcome;
use ventwatch_system_timeline::{
    DirectionShift, EventTimeline, ReplayNotice, RevealRecord,
};
use ventwatch_system_vent_model::{StatusSnapshot, VentRange};

/// Tracks the three hidden vents across a game session.
#[derive(Debug)]
pub struct VentTracker {
    config: InferenceConfig,
    tick: GameTick,
    timeline: EventTimeline,
    readings: [VentReading; 3],
    directions: [MoveDirection; 3],
    movement_phase: Option<u32>,
    last_movement: Option<GameTick>,
    last_reset: Option<GameTick>,
    latest_estimate: StatusSnapshot,
    latest_display: Option<DisplayState>,
}

impl VentTracker {
    /// Creates a tracker awaiting its first tick.
    #[must_use]
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            tick: GameTick::new(0),
            timeline: EventTimeline::new(config),
            readings: [VentReading::Hidden; 3],
            directions: [MoveDirection::Unknown; 3],
            movement_phase: None,
            last_movement: None,
            last_reset: None,
            latest_estimate: StatusSnapshot::starting(),
            latest_display: None,
        }
    }
}

impl Default for VentTracker {
    fn default() -> Self {
        Self::new(InferenceConfig::default())
    }
}

/// Applies a command to the tracker, appending broadcast events.
pub fn apply(tracker: &mut VentTracker, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Configure { config } => {
            *tracker = VentTracker::new(config);
            out_events.push(Event::TrackerConfigured { config });
            refresh_estimate(tracker, out_events);
        }
        Command::IngestTick {
            readings,
            directions,
        } => {
            tracker.tick = tracker.tick.next();
            let tick = tracker.tick;
            let previous = tracker.readings;

            for vent in VentId::ALL {
                let fresh = directions.direction_of(vent);
                let known = tracker.directions[vent.index()];
                if known != fresh {
                    tracker.timeline.record_direction_change(
                        tick,
                        vent,
                        DirectionShift {
                            from: known,
                            to: fresh,
                        },
                    );
                    tracker.directions[vent.index()] = fresh;
                    out_events.push(Event::DirectionChanged {
                        tick,
                        vent,
                        direction: fresh,
                    });
                }
            }

            let mut pattern = StepPattern::empty();
            let mut stepped = false;
            let mut first_reveals: Vec<VentId> = Vec::new();
            for vent in VentId::ALL {
                match (previous[vent.index()], readings[vent.index()]) {
                    (VentReading::Hidden, VentReading::Visible(value)) => {
                        let outcome = tracker.latest_estimate.vent(vent).classify_reveal(value);
                        let first = tracker.timeline.identified_at(vent).is_none();
                        let record = RevealRecord {
                            value,
                            direction: tracker.directions[vent.index()],
                            outcome,
                        };
                        if tracker.timeline.record_reveal(tick, vent, record) {
                            out_events.push(Event::VentIdentified {
                                tick,
                                vent,
                                value,
                                outcome,
                            });
                            if first {
                                first_reveals.push(vent);
                            }
                        }
                    }
                    (VentReading::Visible(before), VentReading::Visible(after))
                        if before != after =>
                    {
                        let outcome = tracker.latest_estimate.vent(vent).classify_reveal(after);
                        let record = RevealRecord {
                            value: after,
                            direction: tracker.directions[vent.index()],
                            outcome,
                        };
                        let _ = tracker.timeline.record_reveal(tick, vent, record);
                        let magnitude = after.abs_diff(before);
                        if magnitude <= BASE_MOVE_RATE {
                            pattern = pattern.with_step(vent, magnitude);
                            stepped = true;
                        }
                    }
                    (VentReading::Visible(_), VentReading::Hidden) => {
                        tracker.timeline.record_hidden(tick, vent);
                    }
                    _ => {}
                }
                tracker.readings[vent.index()] = readings[vent.index()];
            }

            if stepped {
                // Vents visible on both sides that held still measured a
                // zero step on this movement tick.
                for vent in VentId::ALL {
                    if pattern.step_of(vent).is_some() {
                        continue;
                    }
                    if let (VentReading::Visible(before), VentReading::Visible(after)) =
                        (previous[vent.index()], readings[vent.index()])
                    {
                        if before == after {
                            pattern = pattern.with_step(vent, 0);
                        }
                    }
                }
                let _ = tracker.timeline.record_movement(tick, pattern);
                tracker.movement_phase = Some(tick.get() % MOVEMENT_TICK_PERIOD);
                tracker.last_movement = Some(tick);
                out_events.push(Event::MovementObserved { tick, pattern });
            } else if tracker.movement_phase == Some(tick.get() % MOVEMENT_TICK_PERIOD) {
                note_expected_movement(tracker, tick, &previous, &readings, out_events);
            }

            for vent in first_reveals {
                backtrack_after_reveal(tracker, vent, tick, out_events);
            }

            refresh_estimate(tracker, out_events);
        }
        Command::IngestStabilityDelta { raw_delta } => {
            let tick = tracker.tick;
            infer_missing_movement(tracker, tick, out_events);
            let candidate = tracker.timeline.replay(tick).estimate;
            let outcome = tracker.timeline.record_aggregate_delta(tick, raw_delta, candidate);
            out_events.push(Event::StabilityUpdateRecorded { tick, raw_delta });
            match outcome {
                NarrowOutcome::Pinned(modifier) => {
                    out_events.push(Event::ModifierPinned { tick, modifier });
                }
                NarrowOutcome::Exhausted => {
                    out_events.push(Event::ObservationDiscarded {
                        tick,
                        reason: DiscardReason::StaleModifier,
                    });
                }
                NarrowOutcome::Narrowed | NarrowOutcome::Unchanged => {}
            }
            refresh_estimate(tracker, out_events);
        }
        Command::ResetVents => {
            let tick = tracker.tick;
            if tracker.last_reset == Some(tick) {
                return;
            }
            tracker.last_reset = Some(tick);
            tracker.readings = [VentReading::Hidden; 3];
            tracker.timeline.reset(tick, tracker.directions);
            out_events.push(Event::VentsReset { tick });
            refresh_estimate(tracker, out_events);
        }
    }
}

/// Read-only views over the tracker for adapters and presentation layers.
pub mod query {
    use super::{build_display, display_estimate, StatusSnapshot, VentTracker};
    use ventwatch_core::{
        DeltaBounds, DisplayState, GameTick, InferenceConfig, MoveDirection, VentEstimate, VentId,
        VentReading,
    };

    /// Tick of the most recently ingested observation.
    #[must_use]
    pub fn tick(tracker: &VentTracker) -> GameTick {
        tracker.tick
    }

    /// Latest re-derived estimate across all surviving interpretations.
    #[must_use]
    pub fn current_estimate(tracker: &VentTracker) -> &StatusSnapshot {
        &tracker.latest_estimate
    }

    /// Configuration the tracker is running with.
    #[must_use]
    pub fn config(tracker: &VentTracker) -> InferenceConfig {
        tracker.config
    }

    /// Latest reading the client reported for `vent`.
    #[must_use]
    pub fn reading(tracker: &VentTracker, vent: VentId) -> VentReading {
        tracker.readings[vent.index()]
    }

    /// Movement direction currently on record for `vent`.
    #[must_use]
    pub fn direction(tracker: &VentTracker, vent: VentId) -> MoveDirection {
        tracker.directions[vent.index()]
    }

    /// Operator-facing estimate of the hidden value of `vent`.
    #[must_use]
    pub fn vent_estimate(tracker: &VentTracker, vent: VentId) -> VentEstimate {
        display_estimate(tracker.latest_estimate.vent(vent))
    }

    /// Bounds on the next true stability delta, when derivable.
    #[must_use]
    pub fn predicted_delta(tracker: &VentTracker) -> Option<DeltaBounds> {
        tracker.latest_estimate.predicted_delta_bounds()
    }

    /// Tick on which `vent` was first identified in the current epoch.
    #[must_use]
    pub fn identified_at(tracker: &VentTracker, vent: VentId) -> Option<GameTick> {
        tracker.timeline.identified_at(vent)
    }

    /// Complete display payload for presentation layers.
    #[must_use]
    pub fn display_state(tracker: &VentTracker) -> DisplayState {
        build_display(tracker)
    }
}

/// Classifies an expected movement tick on which no visible vent stepped.
///
/// A visible vent holding still outside the freeze band cannot happen on a
/// real movement tick, so the tick is flagged anomalous and movement is
/// suspended. Vents holding still inside the band are recorded as zero
/// steps; with nothing visible the scheduled move is presumed silently.
fn note_expected_movement(
    tracker: &mut VentTracker,
    tick: GameTick,
    previous: &[VentReading; 3],
    readings: &[VentReading; 3],
    out_events: &mut Vec<Event>,
) {
    let mut still = StepPattern::empty();
    let mut out_of_band = false;
    for vent in VentId::ALL {
        if let (VentReading::Visible(before), VentReading::Visible(after)) =
            (previous[vent.index()], readings[vent.index()])
        {
            if before == after {
                still = still.with_step(vent, 0);
                if !in_freeze_band(after) {
                    out_of_band = true;
                }
            }
        }
    }
    if out_of_band {
        tracker.timeline.record_anomaly(tick);
        out_events.push(Event::AnomalyDetected { tick });
        return;
    }
    tracker.last_movement = Some(tick);
    let _ = tracker.timeline.record_movement(tick, still);
    if still.is_empty() {
        return;
    }
    out_events.push(Event::MovementObserved {
        tick,
        pattern: still,
    });
}

/// Synthesizes a movement tick when a stability update arrives after a full
/// movement period without any observed movement.
fn infer_missing_movement(tracker: &mut VentTracker, tick: GameTick, out_events: &mut Vec<Event>) {
    let since = tracker
        .last_movement
        .map_or(u32::MAX, |last| tick.ticks_since(last));
    if since <= MOVEMENT_TICK_PERIOD {
        return;
    }
    let inferred = match tracker.movement_phase {
        Some(phase) => {
            let offset = (tick.get() + MOVEMENT_TICK_PERIOD - phase) % MOVEMENT_TICK_PERIOD;
            GameTick::new(tick.get().saturating_sub(offset))
        }
        None => tick,
    };
    if inferred.get() <= tracker.timeline.checkpoint().get() {
        return;
    }
    if tracker.timeline.record_inferred_movement(inferred) {
        tracker.last_movement = Some(inferred);
        out_events.push(Event::MovementInferred { tick: inferred });
    }
}

/// Walks backward from a first identification and reports what it settled.
fn backtrack_after_reveal(
    tracker: &mut VentTracker,
    vent: VentId,
    tick: GameTick,
    out_events: &mut Vec<Event>,
) {
    let report = tracker.timeline.backtrack_from_reveal(vent, tick);
    for (pinned_tick, modifier) in report.pinned {
        out_events.push(Event::ModifierPinned {
            tick: pinned_tick,
            modifier,
        });
    }
    for exhausted_tick in report.exhausted {
        out_events.push(Event::ObservationDiscarded {
            tick: exhausted_tick,
            reason: DiscardReason::StaleModifier,
        });
    }
    if report.aborted {
        out_events.push(Event::ObservationDiscarded {
            tick,
            reason: DiscardReason::AmbiguousReversal,
        });
    }
}

/// Re-derives the estimate from the timeline and publishes changes.
fn refresh_estimate(tracker: &mut VentTracker, out_events: &mut Vec<Event>) {
    let outcome = tracker.timeline.replay(tracker.tick);
    for notice in outcome.notices {
        match notice {
            ReplayNotice::ModifierPinned { tick, modifier } => {
                out_events.push(Event::ModifierPinned { tick, modifier });
            }
            ReplayNotice::ObservationDiscarded { tick, reason } => {
                out_events.push(Event::ObservationDiscarded { tick, reason });
            }
        }
    }
    tracker.latest_estimate = outcome.estimate;
    let display = build_display(tracker);
    let unchanged = tracker.latest_display.as_ref().map_or(false, |known| {
        known.vents == display.vents && known.predicted_delta == display.predicted_delta
    });
    if !unchanged {
        tracker.latest_display = Some(display.clone());
        out_events.push(Event::EstimateUpdated { display });
    }
}

fn build_display(tracker: &VentTracker) -> DisplayState {
    let vents = [
        vent_display(tracker, VentId::A),
        vent_display(tracker, VentId::B),
        vent_display(tracker, VentId::C),
    ];
    DisplayState {
        tick: tracker.tick,
        vents,
        predicted_delta: tracker.latest_estimate.predicted_delta_bounds(),
    }
}

fn vent_display(tracker: &VentTracker, vent: VentId) -> VentDisplay {
    let estimate = tracker.latest_estimate.vent(vent);
    VentDisplay {
        vent,
        direction: estimate.direction(),
        estimate: display_estimate(estimate),
    }
}

fn display_estimate(range: &VentRange) -> VentEstimate {
    if let Some(value) = range.actual() {
        return VentEstimate::Exact {
            value,
            via_freeze_clip: false,
        };
    }
    if let Some(value) = range.exact_value() {
        return VentEstimate::Exact {
            value,
            via_freeze_clip: range.is_freeze_clip_accurate(),
        };
    }
    match (range.lower(), range.upper()) {
        (Some(lower), Some(upper)) if lower == upper => VentEstimate::Range { span: lower },
        (Some(lower), Some(upper)) => VentEstimate::SplitRange { lower, upper },
        _ => VentEstimate::Unknown,
    }
}
