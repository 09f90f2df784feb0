//! Forward replay of the observation log and reveal-driven backtracking.

use ventwatch_core::{
    DiscardReason, GameTick, StepPattern, VentId, MAX_BRANCHES, MOVEMENT_TICK_PERIOD,
    STALL_CLIP_TICKS,
};
use ventwatch_system_delta_resolver::NarrowOutcome;
use ventwatch_system_vent_model::StatusSnapshot;

use crate::{EventTimeline, ReplayCache, TickRecord};

/// Result of replaying the observation log up to a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayOutcome {
    /// Union of every interpretation branch that survived the walk.
    pub estimate: StatusSnapshot,
    /// Inference state transitions the walk produced, in tick order.
    pub notices: Vec<ReplayNotice>,
}

/// State transition surfaced while replaying recorded observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayNotice {
    /// A past update's hidden modifier was narrowed to a single value.
    ModifierPinned {
        /// Tick of the stability update.
        tick: GameTick,
        /// The only modifier still consistent with the evidence.
        modifier: i32,
    },
    /// An observation could not be applied to any interpretation.
    ObservationDiscarded {
        /// Tick of the discarded observation.
        tick: GameTick,
        /// Why it could not be applied.
        reason: DiscardReason,
    },
}

/// What a backtracking walk from a fresh reveal managed to settle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktrackReport {
    /// Vent whose reveal anchored the walk.
    pub vent: VentId,
    /// Updates whose hidden modifier became certain, in walk order.
    pub pinned: Vec<(GameTick, i32)>,
    /// Updates that ran out of plausible modifiers during the walk.
    pub exhausted: Vec<GameTick>,
    /// Whether the walk gave up before reaching the epoch checkpoint.
    pub aborted: bool,
}

impl EventTimeline {
    /// Replays recorded observations up to and including `now`.
    ///
    /// The walk resumes from the cached state of the previous replay when
    /// nothing earlier changed, and otherwise restarts from the epoch
    /// checkpoint. Asking for a tick at or before the checkpoint returns
    /// the epoch's starting state.
    pub fn replay(&mut self, now: GameTick) -> ReplayOutcome {
        let mut notices = Vec::new();
        let (mut branches, mut stall_run, first) = match self.cache.take() {
            Some(cache)
                if cache.through.get() <= now.get()
                    && cache.through.get() >= self.checkpoint.get() =>
            {
                let first = cache.through.get() + 1;
                (cache.branches, cache.stall_run, first)
            }
            _ => (vec![self.initial.clone()], 0, self.checkpoint.get() + 1),
        };
        for raw in first..=now.get() {
            let tick = GameTick::new(raw);
            let record = self.record_at(tick);
            self.step_tick(&mut branches, &mut stall_run, tick, &record, &mut notices);
        }
        let estimate = merge_branches(&branches);
        self.cache = Some(ReplayCache {
            through: now,
            branches,
            stall_run,
        });
        ReplayOutcome { estimate, notices }
    }

    /// Walks backward from the reveal of `vent` at `tick`, re-narrowing the
    /// modifier candidates of every stability update the walk crosses.
    ///
    /// The revealed value anchors the walk: rewinding it one movement tick
    /// at a time produces progressively earlier snapshots that are often
    /// tight enough to eliminate modifiers that looked plausible when their
    /// updates first arrived. The walk stops at the epoch checkpoint, or
    /// gives up once rewinding has failed to recover a usable state for two
    /// full movement periods.
    pub fn backtrack_from_reveal(&mut self, vent: VentId, tick: GameTick) -> BacktrackReport {
        let mut report = BacktrackReport {
            vent,
            pinned: Vec::new(),
            exhausted: Vec::new(),
            aborted: false,
        };
        if tick.get() <= self.checkpoint.get() {
            return report;
        }
        let mut state = self.replay(tick).estimate;
        let give_up_after = MOVEMENT_TICK_PERIOD * 2;
        let mut stale_ticks: u32 = 0;
        let mut stalled = false;
        for raw in (self.checkpoint.get() + 1..=tick.get()).rev() {
            let step_tick = GameTick::new(raw);
            let record = self.record_at(step_tick);
            if record.aggregate_delta.is_some() {
                if let Some(resolver) = self
                    .resolvers
                    .iter_mut()
                    .find(|resolver| resolver.tick() == step_tick)
                {
                    match resolver.refresh_candidate(state.clone()) {
                        NarrowOutcome::Pinned(modifier) => {
                            report.pinned.push((step_tick, modifier));
                        }
                        NarrowOutcome::Exhausted => report.exhausted.push(step_tick),
                        NarrowOutcome::Narrowed | NarrowOutcome::Unchanged => {}
                    }
                }
            }
            if (record.movement.is_some() || record.inferred_movement) && !record.anomaly {
                let pattern = record.movement.unwrap_or_else(StepPattern::empty);
                if state.reverse_movement(&pattern) {
                    stalled = false;
                    stale_ticks = 0;
                } else {
                    stalled = true;
                }
            }
            for undone in VentId::ALL {
                if let Some(shift) = record.direction_changes[undone.index()] {
                    state.vent_mut(undone).set_direction(shift.from);
                }
                if record.reveals[undone.index()].is_some() {
                    // Before the reveal the value was merely estimated.
                    state.vent_mut(undone).begin_estimating();
                }
            }
            if stalled {
                stale_ticks += 1;
                if stale_ticks > give_up_after {
                    report.aborted = true;
                    break;
                }
            }
        }
        self.cache = None;
        report
    }

    fn step_tick(
        &mut self,
        branches: &mut Vec<StatusSnapshot>,
        stall_run: &mut u32,
        tick: GameTick,
        record: &TickRecord,
        notices: &mut Vec<ReplayNotice>,
    ) {
        let movement_active =
            (record.movement.is_some() || record.inferred_movement) && !record.anomaly;
        for vent in VentId::ALL {
            // The client samples values after the tick's game state update,
            // so on a movement tick every reveal reports the post-move value
            // and lands after the move; the step evidence and the carried
            // estimates describe the pre-move state.
            if !movement_active {
                if let Some(reveal) = record.reveals[vent.index()] {
                    for branch in branches.iter_mut() {
                        let _ = branch.vent_mut(vent).reveal(reveal.value, reveal.direction);
                    }
                }
            }
            if record.hidden[vent.index()] {
                for branch in branches.iter_mut() {
                    branch.vent_mut(vent).begin_estimating();
                }
            }
        }
        if movement_active {
            self.step_movement(branches, tick, record, notices);
            for vent in VentId::ALL {
                if let Some(reveal) = record.reveals[vent.index()] {
                    for branch in branches.iter_mut() {
                        let _ = branch.vent_mut(vent).reveal(reveal.value, reveal.direction);
                    }
                }
            }
        } else {
            for branch in branches.iter_mut() {
                apply_new_directions(branch, record);
            }
        }
        if record.aggregate_delta.is_some() {
            self.step_delta(branches, tick, notices);
            *stall_run = 0;
        } else {
            self.step_stall_check(branches, stall_run);
        }
    }

    /// Applies one movement tick to every branch.
    ///
    /// A known-to-known direction flip recorded on a movement tick is
    /// ambiguous: the client may have sampled the directions before or
    /// after the move landed. Each branch forks into both orderings and
    /// contradicted forks drop out, unless every fork contradicts, in which
    /// case the step evidence is discarded and the prior estimate moves at
    /// its full plausible rate.
    fn step_movement(
        &mut self,
        branches: &mut Vec<StatusSnapshot>,
        tick: GameTick,
        record: &TickRecord,
        notices: &mut Vec<ReplayNotice>,
    ) {
        let pattern = record.movement.unwrap_or_else(StepPattern::empty);
        let ambiguous = VentId::ALL.iter().any(|vent| {
            record.direction_changes[vent.index()].map_or(false, |shift| {
                shift.from.is_known() && shift.to.is_known() && shift.from != shift.to
            })
        });
        let mut first_original: Option<StatusSnapshot> = None;
        let mut survivors: Vec<StatusSnapshot> = Vec::new();
        for branch in branches.drain(..) {
            if first_original.is_none() {
                first_original = Some(branch.clone());
            }
            let mut forks: Vec<StatusSnapshot> = Vec::new();
            if ambiguous {
                forks.push(branch.clone());
            }
            forks.push(branch);
            for (position, mut fork) in forks.into_iter().enumerate() {
                let move_under_old = ambiguous && position == 0;
                if move_under_old {
                    restore_old_directions(&mut fork, record);
                } else {
                    apply_new_directions(&mut fork, record);
                }
                let consistent = advance_fork(&mut fork, &pattern);
                if move_under_old {
                    apply_new_directions(&mut fork, record);
                }
                if consistent {
                    push_capped(&mut survivors, fork);
                }
            }
        }
        if survivors.is_empty() {
            if let Some(mut degraded) = first_original {
                apply_new_directions(&mut degraded, record);
                survivors.push(advance_degraded(&degraded, pattern));
            }
            self.note_discard(tick, DiscardReason::Contradiction, notices);
        }
        *branches = survivors;
    }

    /// Narrows every branch with the resolver of the update at `tick`.
    fn step_delta(
        &mut self,
        branches: &mut Vec<StatusSnapshot>,
        tick: GameTick,
        notices: &mut Vec<ReplayNotice>,
    ) {
        let Some(index) = self
            .resolvers
            .iter()
            .position(|resolver| resolver.tick() == tick)
        else {
            return;
        };
        let refreshed = merge_branches(branches);
        match self.resolvers[index].refresh_candidate(refreshed) {
            NarrowOutcome::Pinned(modifier) => {
                notices.push(ReplayNotice::ModifierPinned { tick, modifier });
            }
            NarrowOutcome::Exhausted => {
                notices.push(ReplayNotice::ObservationDiscarded {
                    tick,
                    reason: DiscardReason::StaleModifier,
                });
            }
            NarrowOutcome::Narrowed | NarrowOutcome::Unchanged => {}
        }
        if self.resolvers[index].is_exhausted() {
            return;
        }
        let resolver = &self.resolvers[index];
        let mut survivors: Vec<StatusSnapshot> = Vec::new();
        let mut fallback: Option<StatusSnapshot> = None;
        for branch in branches.drain(..) {
            let narrowed = resolver.union_inversion(&branch).and_then(|narrowing| {
                let mut trial = branch.clone();
                trial.intersect_with(&narrowing).then_some(trial)
            });
            match narrowed {
                Some(trial) => push_capped(&mut survivors, trial),
                None => {
                    if fallback.is_none() {
                        fallback = Some(branch);
                    }
                }
            }
        }
        let applied = !survivors.is_empty();
        if !applied {
            survivors.extend(fallback);
        }
        *branches = survivors;
        if !applied {
            self.note_discard(tick, DiscardReason::Contradiction, notices);
        }
    }

    /// Detects an estimate that drifted away from the evidence and pulls it
    /// back once.
    ///
    /// When the latest unresolved update's implied deltas have been outside
    /// the predicted delta bounds for a prolonged stretch with no newer
    /// update arriving, every branch is re-clipped against the mildest
    /// still-plausible reading of that update.
    fn step_stall_check(&mut self, branches: &mut Vec<StatusSnapshot>, stall_run: &mut u32) {
        let Some(resolver) = self.resolvers.last() else {
            *stall_run = 0;
            return;
        };
        if resolver.is_verified() || resolver.is_exhausted() || resolver.is_stall_clipped() {
            *stall_run = 0;
            return;
        }
        let estimate = merge_branches(branches);
        let Some(bounds) = estimate.predicted_delta_bounds() else {
            *stall_run = 0;
            return;
        };
        if resolver.implied_deltas().any(|delta| bounds.contains(delta)) {
            *stall_run = 0;
            return;
        }
        *stall_run += 1;
        if *stall_run < STALL_CLIP_TICKS {
            return;
        }
        let Some(lowest) = resolver.possible().lowest() else {
            *stall_run = 0;
            return;
        };
        let target = resolver.raw_delta() - lowest;
        for branch in branches.iter_mut() {
            let mut clipped = branch.clone();
            if clipped.invert_delta(target) {
                *branch = clipped;
            }
        }
        if let Some(latest) = self.resolvers.last_mut() {
            latest.mark_stall_clipped();
        }
        *stall_run = 0;
    }

    /// Surfaces a discarded-observation notice once per tick record.
    fn note_discard(
        &mut self,
        tick: GameTick,
        reason: DiscardReason,
        notices: &mut Vec<ReplayNotice>,
    ) {
        if let Some(slot) = self.record_mut(tick) {
            if slot.contradiction_noted {
                return;
            }
            slot.contradiction_noted = true;
        }
        notices.push(ReplayNotice::ObservationDiscarded { tick, reason });
    }
}

/// Union of every surviving interpretation branch.
fn merge_branches(branches: &[StatusSnapshot]) -> StatusSnapshot {
    let mut merged = branches
        .first()
        .cloned()
        .unwrap_or_else(StatusSnapshot::starting);
    for branch in branches.iter().skip(1) {
        merged.merge_with(branch);
    }
    merged
}

/// Adds a branch, folding it into the newest one once the cap is reached.
fn push_capped(branches: &mut Vec<StatusSnapshot>, branch: StatusSnapshot) {
    if branches.len() < MAX_BRANCHES {
        branches.push(branch);
        return;
    }
    if let Some(last) = branches.last_mut() {
        last.merge_with(&branch);
    }
}

/// Clips a fork by the tick's step evidence and moves it one tick.
///
/// The fork advances even when the evidence contradicts it, so a caller
/// that keeps the fork as a last resort still tracks the true movement.
fn advance_fork(branch: &mut StatusSnapshot, pattern: &StepPattern) -> bool {
    let consistent = branch.clip_by_movement_flags(pattern).is_ok();
    branch.advance_movement();
    consistent
}

/// Moves a snapshot while discarding as little step evidence as possible.
///
/// Flags are dropped one offending vent at a time until the remainder
/// applies cleanly; if nothing applies, the move happens with no clip.
fn advance_degraded(original: &StatusSnapshot, mut pattern: StepPattern) -> StatusSnapshot {
    for _ in 0..VentId::ALL.len() {
        let mut trial = original.clone();
        match trial.clip_by_movement_flags(&pattern) {
            Ok(_) => {
                trial.advance_movement();
                return trial;
            }
            Err(contradiction) => match contradiction.vent {
                Some(vent) if pattern.step_of(vent).is_some() => {
                    pattern = pattern_without(&pattern, vent);
                }
                _ => break,
            },
        }
    }
    let mut unclipped = original.clone();
    unclipped.advance_movement();
    unclipped
}

fn pattern_without(pattern: &StepPattern, dropped: VentId) -> StepPattern {
    let mut next = StepPattern::empty();
    for vent in VentId::ALL {
        if vent == dropped {
            continue;
        }
        if let Some(step) = pattern.step_of(vent) {
            next = next.with_step(vent, step);
        }
    }
    next
}

fn apply_new_directions(branch: &mut StatusSnapshot, record: &TickRecord) {
    for vent in VentId::ALL {
        if let Some(shift) = record.direction_changes[vent.index()] {
            branch.vent_mut(vent).set_direction(shift.to);
        }
    }
}

fn restore_old_directions(branch: &mut StatusSnapshot, record: &TickRecord) {
    for vent in VentId::ALL {
        if let Some(shift) = record.direction_changes[vent.index()] {
            branch.vent_mut(vent).set_direction(shift.from);
        }
    }
}
