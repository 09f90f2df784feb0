#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Ambiguity tracking for raw stability updates.
//!
//! Every periodic stability update the client reports carries a hidden
//! per-update modifier drawn from a small team-size dependent window, so a
//! raw delta pins the true delta only up to that window.
//! [`DeltaAmbiguityResolver`] keeps the raw observation, the snapshot it was
//! taken against and the set of modifiers still plausible, eliminating
//! candidates whenever fresher knowledge of that tick rules their implied
//! true deltas out. Elimination is monotone: a verified modifier never
//! reverts and an exhausted update never recovers.

use ventwatch_core::{GameTick, InferenceConfig};
use ventwatch_system_vent_model::StatusSnapshot;

/// Set of hidden per-update modifiers still considered plausible.
///
/// Modifiers occupy the window `[-(team_size + 1), 0]`, so the set is a
/// bitmask indexed from the most negative candidate upward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModifierSet {
    low: i32,
    bits: u8,
}

impl ModifierSet {
    /// The full candidate set for the provided configuration.
    #[must_use]
    pub fn all(config: InferenceConfig) -> Self {
        Self {
            low: config.modifier_low(),
            bits: ((1u16 << config.modifier_count()) - 1) as u8,
        }
    }

    /// Whether `modifier` is still plausible.
    #[must_use]
    pub fn contains(&self, modifier: i32) -> bool {
        self.index_of(modifier)
            .map(|index| self.bits & (1 << index) != 0)
            .unwrap_or(false)
    }

    /// Removes `modifier` from the set.
    pub fn remove(&mut self, modifier: i32) {
        if let Some(index) = self.index_of(modifier) {
            self.bits &= !(1 << index);
        }
    }

    /// Number of modifiers still plausible.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.bits.count_ones()
    }

    /// Whether no modifier is plausible any more.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Most negative modifier still plausible.
    #[must_use]
    pub fn lowest(&self) -> Option<i32> {
        self.iter().next()
    }

    /// The single surviving modifier, when exactly one remains.
    #[must_use]
    pub fn sole_survivor(&self) -> Option<i32> {
        if self.len() == 1 {
            self.lowest()
        } else {
            None
        }
    }

    /// Iterates the plausible modifiers from most to least negative.
    pub fn iter(&self) -> impl Iterator<Item = i32> {
        let low = self.low;
        let bits = self.bits;
        (0..u8::BITS).filter_map(move |index| {
            if bits & (1 << index) != 0 {
                Some(low + index as i32)
            } else {
                None
            }
        })
    }

    fn index_of(&self, modifier: i32) -> Option<u32> {
        let offset = modifier - self.low;
        if (0..u8::BITS as i32).contains(&offset) {
            Some(offset as u32)
        } else {
            None
        }
    }
}

/// Result of re-checking the plausible modifier set against fresh evidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NarrowOutcome {
    /// Every previously plausible modifier survived.
    Unchanged,
    /// At least one modifier was eliminated, but several remain.
    Narrowed,
    /// Exactly one modifier survived and is now verified.
    Pinned(i32),
    /// The last plausible modifier was eliminated; the observation is stale
    /// and must be ignored from here on.
    Exhausted,
}

/// Tracks one raw stability update until its hidden modifier is certain.
#[derive(Clone, Debug)]
pub struct DeltaAmbiguityResolver {
    tick: GameTick,
    raw_delta: i32,
    candidate: StatusSnapshot,
    possible: ModifierSet,
    chosen: Option<i32>,
    exhausted: bool,
    stall_clipped: bool,
}

impl DeltaAmbiguityResolver {
    /// Starts resolving a raw update observed against `candidate`.
    #[must_use]
    pub fn new(
        tick: GameTick,
        raw_delta: i32,
        mut candidate: StatusSnapshot,
        config: InferenceConfig,
    ) -> Self {
        candidate.set_delta(raw_delta);
        Self {
            tick,
            raw_delta,
            candidate,
            possible: ModifierSet::all(config),
            chosen: None,
            exhausted: false,
            stall_clipped: false,
        }
    }

    /// Tick the raw update was observed on.
    #[must_use]
    pub const fn tick(&self) -> GameTick {
        self.tick
    }

    /// Raw delta as reported by the client.
    #[must_use]
    pub const fn raw_delta(&self) -> i32 {
        self.raw_delta
    }

    /// Modifiers still plausible for this update.
    #[must_use]
    pub const fn possible(&self) -> ModifierSet {
        self.possible
    }

    /// Snapshot of estimates the update is currently checked against.
    #[must_use]
    pub const fn candidate(&self) -> &StatusSnapshot {
        &self.candidate
    }

    /// Whether the hidden modifier has been narrowed to a single value.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.chosen.is_some()
    }

    /// The verified modifier, once one exists.
    #[must_use]
    pub const fn verified_modifier(&self) -> Option<i32> {
        self.chosen
    }

    /// Whether every plausible modifier has been eliminated.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether the periodic stall health check already clipped against this
    /// update.
    #[must_use]
    pub const fn is_stall_clipped(&self) -> bool {
        self.stall_clipped
    }

    /// Marks the update as consumed by the stall health check.
    pub fn mark_stall_clipped(&mut self) {
        self.stall_clipped = true;
    }

    /// Best single guess for the hidden modifier: the verified one when it
    /// exists, otherwise the most negative still-plausible candidate.
    #[must_use]
    pub fn effective_modifier(&self) -> Option<i32> {
        self.chosen.or_else(|| self.possible.lowest())
    }

    /// True delta candidates implied by the surviving modifiers.
    pub fn implied_deltas(&self) -> impl Iterator<Item = i32> {
        let raw = self.raw_delta;
        self.possible.iter().map(move |modifier| raw - modifier)
    }

    /// Replaces the candidate snapshot with fresher knowledge of the same
    /// tick and re-runs elimination.
    ///
    /// Verification never reverts: refreshing a verified update keeps its
    /// chosen modifier no matter what the new snapshot says.
    pub fn refresh_candidate(&mut self, candidate: StatusSnapshot) -> NarrowOutcome {
        let mut candidate = candidate;
        candidate.set_delta(self.raw_delta);
        self.candidate = candidate;
        self.narrow_by_invalid_points()
    }

    /// Eliminates modifiers whose implied true delta the candidate snapshot
    /// cannot produce.
    ///
    /// `Pinned` and `Exhausted` are reported exactly once, on the call that
    /// causes the transition; later calls report `Unchanged`.
    pub fn narrow_by_invalid_points(&mut self) -> NarrowOutcome {
        if self.exhausted || self.chosen.is_some() {
            return NarrowOutcome::Unchanged;
        }
        let before = self.possible.len();
        for modifier in self.possible.iter().collect::<Vec<_>>() {
            let mut probe = self.candidate.clone();
            if !probe.invert_delta(self.raw_delta - modifier) {
                self.possible.remove(modifier);
            }
        }
        if self.possible.is_empty() {
            self.exhausted = true;
            return NarrowOutcome::Exhausted;
        }
        if let Some(only) = self.possible.sole_survivor() {
            self.chosen = Some(only);
            return NarrowOutcome::Pinned(only);
        }
        if self.possible.len() < before {
            NarrowOutcome::Narrowed
        } else {
            NarrowOutcome::Unchanged
        }
    }

    /// Folds the update into `base`: the union of `base` narrowed by every
    /// surviving modifier's implied true delta.
    ///
    /// `None` when the update is exhausted or no implied delta is reachable
    /// from `base`; the caller decides whether that is a contradiction.
    #[must_use]
    pub fn union_inversion(&self, base: &StatusSnapshot) -> Option<StatusSnapshot> {
        if self.exhausted {
            return None;
        }
        if let Some(modifier) = self.chosen {
            let mut probe = base.clone();
            return probe
                .invert_delta(self.raw_delta - modifier)
                .then_some(probe);
        }
        let mut union: Option<StatusSnapshot> = None;
        for modifier in self.possible.iter() {
            let mut probe = base.clone();
            if !probe.invert_delta(self.raw_delta - modifier) {
                continue;
            }
            union = Some(match union {
                Some(mut folded) => {
                    folded.merge_with(&probe);
                    folded
                }
                None => probe,
            });
        }
        union
    }
}

#[cfg(test)]
mod tests {
    use super::{DeltaAmbiguityResolver, ModifierSet, NarrowOutcome};
    use ventwatch_core::{GameTick, InferenceConfig, Interval, MoveDirection, VentId};
    use ventwatch_system_vent_model::StatusSnapshot;

    fn solo_config() -> InferenceConfig {
        InferenceConfig::new(1)
    }

    fn snapshot_with(reveals: &[(VentId, u8)]) -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::starting();
        for (vent, value) in reveals {
            let _ = snapshot.vent_mut(*vent).reveal(*value, MoveDirection::Up);
        }
        snapshot
    }

    #[test]
    fn modifier_set_spans_the_team_window() {
        let set = ModifierSet::all(InferenceConfig::new(5));
        assert_eq!(set.len(), 7);
        assert!(set.contains(-6));
        assert!(set.contains(0));
        assert!(!set.contains(1));
        assert_eq!(set.lowest(), Some(-6));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![-6, -5, -4, -3, -2, -1, 0]);
    }

    #[test]
    fn removing_all_candidates_empties_the_set() {
        let mut set = ModifierSet::all(solo_config());
        for modifier in [-2, -1, 0] {
            assert!(set.contains(modifier));
            set.remove(modifier);
        }
        assert!(set.is_empty());
        assert_eq!(set.sole_survivor(), None);
    }

    #[test]
    fn perfect_delta_pins_the_modifier_immediately() {
        let candidate = snapshot_with(&[(VentId::B, 50), (VentId::C, 50)]);
        let mut resolver = DeltaAmbiguityResolver::new(GameTick::new(25), 25, candidate, solo_config());
        assert_eq!(resolver.narrow_by_invalid_points(), NarrowOutcome::Pinned(0));
        assert!(resolver.is_verified());
        assert_eq!(resolver.effective_modifier(), Some(0));

        let union = resolver
            .union_inversion(&snapshot_with(&[(VentId::B, 50), (VentId::C, 50)]))
            .unwrap();
        assert_eq!(union.vent(VentId::A).exact_value(), Some(50));
    }

    #[test]
    fn ambiguous_delta_keeps_every_modifier_and_unions_the_windows() {
        let candidate = snapshot_with(&[(VentId::C, 50)]);
        let mut resolver = DeltaAmbiguityResolver::new(GameTick::new(25), 23, candidate.clone(), solo_config());
        assert_eq!(resolver.narrow_by_invalid_points(), NarrowOutcome::Unchanged);
        assert_eq!(resolver.possible().len(), 3);

        let union = resolver.union_inversion(&candidate).unwrap();
        for vent in [VentId::A, VentId::B] {
            assert_eq!(union.vent(vent).lower(), Some(Interval::new(47, 53)));
            assert_eq!(union.vent(vent).upper(), Some(Interval::new(47, 53)));
        }
    }

    #[test]
    fn impossible_update_exhausts_once_and_stays_silent() {
        let candidate = snapshot_with(&[(VentId::A, 50), (VentId::B, 50), (VentId::C, 50)]);
        let mut resolver = DeltaAmbiguityResolver::new(GameTick::new(50), 20, candidate, solo_config());
        assert_eq!(resolver.narrow_by_invalid_points(), NarrowOutcome::Exhausted);
        assert!(resolver.is_exhausted());
        assert_eq!(resolver.narrow_by_invalid_points(), NarrowOutcome::Unchanged);
        assert_eq!(resolver.union_inversion(&StatusSnapshot::starting()), None);
    }

    #[test]
    fn verification_survives_a_worse_candidate() {
        let candidate = snapshot_with(&[(VentId::B, 50), (VentId::C, 50)]);
        let mut resolver = DeltaAmbiguityResolver::new(GameTick::new(25), 25, candidate, solo_config());
        assert_eq!(resolver.narrow_by_invalid_points(), NarrowOutcome::Pinned(0));

        let vague = StatusSnapshot::starting();
        assert_eq!(resolver.refresh_candidate(vague), NarrowOutcome::Unchanged);
        assert!(resolver.is_verified());
        assert_eq!(resolver.verified_modifier(), Some(0));
    }

    #[test]
    fn refreshed_candidate_eliminates_newly_impossible_modifiers() {
        // Nothing is known at first, so every modifier survives.
        let mut resolver = DeltaAmbiguityResolver::new(
            GameTick::new(25),
            23,
            StatusSnapshot::starting(),
            solo_config(),
        );
        assert_eq!(resolver.narrow_by_invalid_points(), NarrowOutcome::Unchanged);

        // Backtracking later pins all three vents for that tick; the true
        // delta they produce is 24, so only the -1 modifier can explain the
        // raw reading of 23.
        assert_eq!(
            resolver.refresh_candidate(snapshot_with(&[
                (VentId::A, 48),
                (VentId::B, 50),
                (VentId::C, 50),
            ])),
            NarrowOutcome::Pinned(-1)
        );
    }

    #[test]
    fn union_inversion_skips_unreachable_modifiers() {
        let base = snapshot_with(&[(VentId::B, 50), (VentId::C, 50)]);
        let resolver = DeltaAmbiguityResolver::new(GameTick::new(25), 24, base.clone(), solo_config());
        // Raw 24 allows true deltas 24, 25 and 26; 26 is unreachable and
        // must simply be skipped rather than poisoning the union. The
        // surviving windows touch at 50 and fold into one range.
        let union = resolver.union_inversion(&base).unwrap();
        let vent_a = union.vent(VentId::A);
        assert_eq!(vent_a.lower(), Some(Interval::new(47, 53)));
        assert_eq!(vent_a.upper(), Some(Interval::new(47, 53)));
    }
}
