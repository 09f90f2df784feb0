//! Joint candidate estimate for all three vents at one point in time.

use std::error::Error;
use std::fmt;

use crate::{ClipOutcome, InfluenceBound, VentRange};
use ventwatch_core::{
    freeze_band, in_freeze_band, stability_delta, stability_score, DeltaBounds, Interval,
    MoveDirection, StepPattern, VentId, MAX_STABILITY_DELTA, MAX_VENT_VALUE, MIN_VENT_VALUE,
    PERFECT_VENT_VALUE,
};

/// Movement-step evidence that cannot be reconciled with the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotContradiction {
    /// Vent whose evidence broke the snapshot, when one is attributable.
    pub vent: Option<VentId>,
}

impl fmt::Display for SnapshotContradiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vent {
            Some(vent) => write!(f, "movement evidence contradicts vent {}", vent.label()),
            None => write!(f, "movement evidence contradicts the snapshot"),
        }
    }
}

impl Error for SnapshotContradiction {}

/// Joint candidate estimate for the three vents plus the raw aggregate
/// delta recorded with it.
///
/// Snapshots have plain value semantics: replay and the ambiguity resolver
/// clone them freely to probe hypothetical narrowings without disturbing
/// committed state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    vents: [VentRange; 3],
    delta: i32,
}

impl StatusSnapshot {
    /// Snapshot for a game about which nothing is known yet.
    #[must_use]
    pub fn starting() -> Self {
        Self {
            vents: [
                VentRange::starting(VentId::A),
                VentRange::starting(VentId::B),
                VentRange::starting(VentId::C),
            ],
            delta: 0,
        }
    }

    /// Snapshot immediately after an in-game vent reset.
    #[must_use]
    pub fn after_reset(directions: [MoveDirection; 3]) -> Self {
        Self {
            vents: [
                VentRange::after_reset(VentId::A, directions[0]),
                VentRange::after_reset(VentId::B, directions[1]),
                VentRange::after_reset(VentId::C, directions[2]),
            ],
            delta: 0,
        }
    }

    /// Estimate for the requested vent.
    #[must_use]
    pub fn vent(&self, vent: VentId) -> &VentRange {
        &self.vents[vent.index()]
    }

    /// Mutable estimate for the requested vent.
    pub fn vent_mut(&mut self, vent: VentId) -> &mut VentRange {
        &mut self.vents[vent.index()]
    }

    /// Raw aggregate delta recorded alongside the snapshot.
    #[must_use]
    pub const fn delta(&self) -> i32 {
        self.delta
    }

    /// Records the raw aggregate delta the snapshot was taken with.
    pub fn set_delta(&mut self, delta: i32) {
        self.delta = delta;
    }

    /// Narrows unrevealed vents so the snapshot can produce `total_delta`.
    ///
    /// With one unknown vent the score window inverts exactly; with two the
    /// unknowns are assumed equal and share the window. Three unknowns carry
    /// no information and zero unknowns reduce to an equality check. Returns
    /// `false` when no assignment yields the delta, with the offending
    /// candidate ranges already cleared.
    pub fn invert_delta(&mut self, total_delta: i32) -> bool {
        let mut exact = [0u8; 3];
        let mut known_total: i32 = 0;
        let mut unknown: Vec<VentId> = Vec::new();
        for vent in VentId::ALL {
            match self.vents[vent.index()].exact_value() {
                Some(value) => {
                    exact[vent.index()] = value;
                    known_total += i32::from(stability_score(value));
                }
                None => unknown.push(vent),
            }
        }
        // Flooring the three-way average puts the score total in a
        // width-two window around 3 * (delta + 25).
        let window_low = 3 * (total_delta + MAX_STABILITY_DELTA) - known_total;
        let window_high = window_low + 2;
        match unknown.as_slice() {
            [] => stability_delta(exact) == total_delta,
            [lone] => match score_window_pieces(window_low, window_high) {
                Some(pieces) => self.vents[lone.index()].constrain(&pieces),
                None => {
                    self.vents[lone.index()].clear_ranges();
                    false
                }
            },
            [first, second] => {
                // Two unknown scores assumed equal split the window in half.
                if window_high < 0 {
                    self.vents[first.index()].clear_ranges();
                    self.vents[second.index()].clear_ranges();
                    return false;
                }
                let shared_low = (window_low + 1).max(0) / 2;
                let shared_high = window_high / 2;
                match score_window_pieces(shared_low, shared_high) {
                    Some(pieces) => {
                        let first_fits = self.vents[first.index()].constrain(&pieces);
                        let second_fits = self.vents[second.index()].constrain(&pieces);
                        first_fits && second_fits
                    }
                    None => {
                        self.vents[first.index()].clear_ranges();
                        self.vents[second.index()].clear_ranges();
                        false
                    }
                }
            }
            _ => true,
        }
    }

    /// Applies the band-membership evidence carried by a movement step
    /// pattern.
    ///
    /// Memberships are propagated through the influence topology until they
    /// settle, then every determined vent is clipped accordingly. Returns
    /// whether any range narrowed. Evidence that cannot be reconciled with
    /// the snapshot or with itself yields an error, with the offending
    /// vent's ranges already cleared when one candidate range is to blame.
    pub fn clip_by_movement_flags(
        &mut self,
        pattern: &StepPattern,
    ) -> Result<bool, SnapshotContradiction> {
        let mut memberships = Memberships::from_snapshot(self);
        for _ in 0..VentId::ALL.len() {
            for vent in VentId::ALL {
                let Some(step) = pattern.step_of(vent) else {
                    continue;
                };
                apply_step_constraint(&mut memberships, vent, step)?;
            }
        }
        let mut narrowed = false;
        for vent in VentId::ALL {
            let Some(banded) = memberships.get(vent) else {
                continue;
            };
            match self.vents[vent.index()].clip_to_band(freeze_band(), banded) {
                ClipOutcome::Unchanged => {}
                ClipOutcome::Narrowed => narrowed = true,
                ClipOutcome::Contradiction => {
                    return Err(SnapshotContradiction { vent: Some(vent) })
                }
            }
        }
        Ok(narrowed)
    }

    /// Freeze-band membership of `vent`, when every candidate agrees on it.
    #[must_use]
    pub fn band_membership(&self, vent: VentId) -> Option<bool> {
        self.vents[vent.index()].band_membership()
    }

    /// Bounds on the slowdown `vent` receives from its influencers.
    #[must_use]
    pub fn outside_influence(&self, vent: VentId) -> InfluenceBound {
        let influencers = vent.influencers();
        if influencers
            .iter()
            .any(|v| self.vents[v.index()].band_membership() == Some(true))
        {
            return InfluenceBound::SLOWED;
        }
        if influencers
            .iter()
            .all(|v| self.vents[v.index()].band_membership() == Some(false))
        {
            return InfluenceBound::NONE;
        }
        InfluenceBound::UNCERTAIN
    }

    /// Advances every vent across one movement tick.
    ///
    /// All influence bounds are computed against the pre-movement state
    /// before any vent moves.
    pub fn advance_movement(&mut self) {
        let bounds = [
            self.outside_influence(VentId::A),
            self.outside_influence(VentId::B),
            self.outside_influence(VentId::C),
        ];
        for vent in VentId::ALL {
            self.vents[vent.index()].apply_movement(bounds[vent.index()]);
        }
    }

    /// Rewinds the snapshot across one movement tick.
    ///
    /// Vents that were visible on both sides of the movement rewind exactly
    /// and anchor the band memberships used for the others; the rest rewind
    /// conservatively or clear when a sound rewind is impossible. Returns
    /// `false` when no vent holds a reliably known value to anchor the
    /// rewind or when the step evidence is incoherent.
    pub fn reverse_movement(&mut self, pattern: &StepPattern) -> bool {
        if !VentId::ALL
            .iter()
            .any(|vent| self.vents[vent.index()].exact_value().is_some())
        {
            return false;
        }
        let mut exact_before: [Option<u8>; 3] = [None; 3];
        for vent in VentId::ALL {
            let slot = &self.vents[vent.index()];
            let (Some(value), Some(step)) = (slot.exact_value(), pattern.step_of(vent)) else {
                continue;
            };
            if !slot.direction().is_known() {
                continue;
            }
            let earlier = i32::from(value) - slot.direction().signum() * i32::from(step);
            if (i32::from(MIN_VENT_VALUE)..=i32::from(MAX_VENT_VALUE)).contains(&earlier) {
                exact_before[vent.index()] = Some(earlier as u8);
            }
        }
        // The step evidence describes the pre-movement state, which is the
        // state the rewind produces.
        let mut memberships = Memberships::from_values(&exact_before);
        for _ in 0..VentId::ALL.len() {
            for vent in VentId::ALL {
                let Some(step) = pattern.step_of(vent) else {
                    continue;
                };
                if apply_step_constraint(&mut memberships, vent, step).is_err() {
                    return false;
                }
            }
        }
        let bounds = [
            memberships.outside_bound(VentId::A),
            memberships.outside_bound(VentId::B),
            memberships.outside_bound(VentId::C),
        ];
        let mut any_rewound = false;
        for vent in VentId::ALL {
            let slot = &mut self.vents[vent.index()];
            if let Some(value) = exact_before[vent.index()] {
                slot.set_point_estimate(value);
                any_rewound = true;
            } else if slot.reverse_one_tick(bounds[vent.index()]) {
                any_rewound = true;
            } else {
                slot.clear_ranges();
            }
        }
        for vent in VentId::ALL {
            if exact_before[vent.index()].is_some() {
                continue;
            }
            if let Some(banded) = memberships.get(vent) {
                let _ = self.vents[vent.index()].clip_to_band(freeze_band(), banded);
            }
        }
        any_rewound
    }

    /// Widens the snapshot to cover everything `other` considers possible.
    pub fn merge_with(&mut self, other: &StatusSnapshot) {
        for vent in VentId::ALL {
            self.vents[vent.index()].merge_with(&other.vents[vent.index()]);
        }
    }

    /// Narrows the snapshot to values both snapshots consider possible.
    ///
    /// Returns `false` on a contradiction. Some vents may already be
    /// narrowed when that happens, so callers that must preserve the prior
    /// state probe on a clone and commit on success.
    pub fn intersect_with(&mut self, other: &StatusSnapshot) -> bool {
        let mut compatible = true;
        for vent in VentId::ALL {
            if !self.vents[vent.index()].intersect_with(&other.vents[vent.index()]) {
                compatible = false;
            }
        }
        compatible
    }

    /// Bounds on the next true stability delta implied by the estimate.
    ///
    /// `None` until at least one vent carries information beyond the bare
    /// value domain.
    #[must_use]
    pub fn predicted_delta_bounds(&self) -> Option<DeltaBounds> {
        let mut informed = false;
        let mut low_total: i32 = 0;
        let mut high_total: i32 = 0;
        for vent in VentId::ALL {
            let slot = &self.vents[vent.index()];
            if slot.exact_value().is_some() || slot.is_defined() {
                informed = true;
            }
            let (low, high) = score_bounds(slot);
            low_total += low;
            high_total += high;
        }
        if !informed {
            return None;
        }
        Some(DeltaBounds::new(
            low_total / 3 - MAX_STABILITY_DELTA,
            high_total / 3 - MAX_STABILITY_DELTA,
        ))
    }
}

/// Tri-state freeze-band membership working set for the three vents.
struct Memberships {
    known: [Option<bool>; 3],
}

impl Memberships {
    fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        let mut known = [None; 3];
        for vent in VentId::ALL {
            known[vent.index()] = snapshot.vents[vent.index()].band_membership();
        }
        Self { known }
    }

    fn from_values(values: &[Option<u8>; 3]) -> Self {
        let mut known = [None; 3];
        for (slot, value) in known.iter_mut().zip(values) {
            *slot = value.map(in_freeze_band);
        }
        Self { known }
    }

    fn get(&self, vent: VentId) -> Option<bool> {
        self.known[vent.index()]
    }

    fn set(&mut self, vent: VentId, banded: bool) -> Result<(), SnapshotContradiction> {
        match self.known[vent.index()] {
            Some(existing) if existing != banded => {
                Err(SnapshotContradiction { vent: Some(vent) })
            }
            _ => {
                self.known[vent.index()] = Some(banded);
                Ok(())
            }
        }
    }

    /// Combined influencer membership, when it is determined.
    fn outside(&self, vent: VentId) -> Option<bool> {
        let influencers = vent.influencers();
        if influencers.iter().any(|v| self.get(*v) == Some(true)) {
            return Some(true);
        }
        if influencers.iter().all(|v| self.get(*v) == Some(false)) {
            return Some(false);
        }
        None
    }

    fn outside_bound(&self, vent: VentId) -> InfluenceBound {
        match self.outside(vent) {
            Some(true) => InfluenceBound::SLOWED,
            Some(false) => InfluenceBound::NONE,
            None => InfluenceBound::UNCERTAIN,
        }
    }
}

/// Folds one observed step magnitude into the membership working set.
fn apply_step_constraint(
    memberships: &mut Memberships,
    vent: VentId,
    step: u8,
) -> Result<(), SnapshotContradiction> {
    match step {
        2 => {
            // Full-rate move: neither the vent nor any influencer is banded.
            memberships.set(vent, false)?;
            for influencer in vent.influencers() {
                memberships.set(*influencer, false)?;
            }
        }
        1 => {
            // Exactly one slowdown, either the vent's own or an outside one.
            match (memberships.get(vent), memberships.outside(vent)) {
                (Some(own), Some(outside)) if own == outside => {
                    return Err(SnapshotContradiction { vent: Some(vent) });
                }
                (Some(own), _) => resolve_outside(memberships, vent, !own)?,
                (None, Some(outside)) => memberships.set(vent, !outside)?,
                (None, None) => {}
            }
        }
        0 => {
            // A full freeze needs the vent banded plus an outside slowdown,
            // which the first vent can never receive.
            if vent.influencers().is_empty() {
                return Err(SnapshotContradiction { vent: Some(vent) });
            }
            memberships.set(vent, true)?;
            resolve_outside(memberships, vent, true)?;
        }
        _ => return Err(SnapshotContradiction { vent: Some(vent) }),
    }
    Ok(())
}

/// Forces the combined influencer membership of `vent` to `banded`.
fn resolve_outside(
    memberships: &mut Memberships,
    vent: VentId,
    banded: bool,
) -> Result<(), SnapshotContradiction> {
    let influencers = vent.influencers();
    if !banded {
        for influencer in influencers {
            memberships.set(*influencer, false)?;
        }
        return Ok(());
    }
    if influencers.is_empty() {
        return Err(SnapshotContradiction { vent: Some(vent) });
    }
    if influencers.iter().any(|v| memberships.get(*v) == Some(true)) {
        return Ok(());
    }
    let unresolved: Vec<VentId> = influencers
        .iter()
        .copied()
        .filter(|v| memberships.get(*v) != Some(false))
        .collect();
    match unresolved.as_slice() {
        [] => Err(SnapshotContradiction { vent: Some(vent) }),
        [only] => memberships.set(*only, true),
        // Several influencers could be the banded one; another pass may
        // settle it.
        _ => Ok(()),
    }
}

/// Maps a score window onto the two mirrored value pieces producing it.
fn score_window_pieces(window_low: i32, window_high: i32) -> Option<Vec<Interval>> {
    let low = window_low.max(0);
    let high = window_high.min(i32::from(PERFECT_VENT_VALUE));
    if low > high {
        return None;
    }
    let low = low as u8;
    let high = high as u8;
    Some(vec![
        Interval::new(low, high),
        Interval::new(MAX_VENT_VALUE - high, MAX_VENT_VALUE - low),
    ])
}

/// Smallest and largest stability scores any candidate value can produce.
fn score_bounds(slot: &VentRange) -> (i32, i32) {
    if let Some(value) = slot.exact_value() {
        let score = i32::from(stability_score(value));
        return (score, score);
    }
    let pieces = match (slot.lower(), slot.upper()) {
        (Some(lower), Some(upper)) if lower == upper => vec![lower],
        (Some(lower), Some(upper)) => vec![lower, upper],
        _ => vec![slot.total_bound()],
    };
    let mut low = i32::from(PERFECT_VENT_VALUE);
    let mut high = 0;
    for piece in pieces {
        let start_score = i32::from(stability_score(piece.start()));
        let end_score = i32::from(stability_score(piece.end()));
        let peak = if piece.contains(PERFECT_VENT_VALUE) {
            i32::from(PERFECT_VENT_VALUE)
        } else {
            start_score.max(end_score)
        };
        low = low.min(start_score.min(end_score));
        high = high.max(peak);
    }
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::StatusSnapshot;
    use ventwatch_core::{
        DeltaBounds, Interval, MoveDirection, StepPattern, VentId, MAX_STABILITY_DELTA,
    };

    fn with_reveal(snapshot: &mut StatusSnapshot, vent: VentId, value: u8) {
        let _ = snapshot.vent_mut(vent).reveal(value, MoveDirection::Up);
    }

    #[test]
    fn single_unknown_inversion_recovers_the_exact_value() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::B, 50);
        with_reveal(&mut snapshot, VentId::C, 50);
        assert!(snapshot.invert_delta(MAX_STABILITY_DELTA));
        assert_eq!(snapshot.vent(VentId::A).exact_value(), Some(50));
    }

    #[test]
    fn single_unknown_inversion_yields_mirrored_pieces() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::B, 58);
        with_reveal(&mut snapshot, VentId::C, 57);
        assert!(snapshot.invert_delta(14));
        assert_eq!(snapshot.vent(VentId::A).lower(), Some(Interval::new(32, 34)));
        assert_eq!(snapshot.vent(VentId::A).upper(), Some(Interval::new(66, 68)));
    }

    #[test]
    fn two_unknowns_share_the_score_window() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::C, 50);
        assert!(snapshot.invert_delta(23));
        for vent in [VentId::A, VentId::B] {
            assert_eq!(snapshot.vent(vent).lower(), Some(Interval::new(47, 48)));
            assert_eq!(snapshot.vent(vent).upper(), Some(Interval::new(52, 53)));
        }
    }

    #[test]
    fn all_known_inversion_is_an_equality_check() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::A, 50);
        with_reveal(&mut snapshot, VentId::B, 50);
        with_reveal(&mut snapshot, VentId::C, 50);
        assert!(snapshot.invert_delta(25));
        assert!(!snapshot.invert_delta(24));
    }

    #[test]
    fn impossible_window_clears_the_unknown_vent() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::B, 50);
        with_reveal(&mut snapshot, VentId::C, 50);
        assert!(!snapshot.invert_delta(26));
        assert!(!snapshot.vent(VentId::A).is_defined());
    }

    #[test]
    fn all_unknown_inversion_carries_no_information() {
        let mut snapshot = StatusSnapshot::starting();
        assert!(snapshot.invert_delta(10));
        for vent in VentId::ALL {
            assert!(!snapshot.vent(vent).is_defined());
        }
    }

    #[test]
    fn full_rate_step_marks_the_influencers_unbanded() {
        let mut snapshot = StatusSnapshot::starting();
        assert!(snapshot
            .vent_mut(VentId::A)
            .constrain(&[Interval::new(30, 60)]));
        let pattern = StepPattern::empty().with_step(VentId::B, 2);
        let narrowed = snapshot.clip_by_movement_flags(&pattern);
        assert_eq!(narrowed, Ok(true));
        assert_eq!(snapshot.vent(VentId::A).lower(), Some(Interval::new(30, 40)));
        assert_eq!(snapshot.vent(VentId::A).upper(), Some(Interval::new(60, 60)));
    }

    #[test]
    fn zero_step_for_the_first_vent_is_invalid_evidence() {
        let mut snapshot = StatusSnapshot::starting();
        let pattern = StepPattern::empty().with_step(VentId::A, 0);
        assert!(snapshot.clip_by_movement_flags(&pattern).is_err());
    }

    #[test]
    fn single_slowdown_resolves_against_a_known_influencer() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::A, 45);
        let pattern = StepPattern::empty().with_step(VentId::B, 1);
        assert_eq!(snapshot.clip_by_movement_flags(&pattern), Ok(true));
        // A sits in the band, so B's own membership must be clear.
        assert_eq!(snapshot.band_membership(VentId::B), Some(false));
    }

    #[test]
    fn revealed_vent_contradicting_its_step_is_an_error() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::A, 45);
        let pattern = StepPattern::empty().with_step(VentId::A, 2);
        assert!(snapshot.clip_by_movement_flags(&pattern).is_err());
    }

    #[test]
    fn movement_uses_influence_bounds_from_the_pre_move_state() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::A, 45);
        assert!(snapshot
            .vent_mut(VentId::B)
            .constrain(&[Interval::new(10, 20)]));
        snapshot.vent_mut(VentId::B).set_direction(MoveDirection::Up);
        snapshot.advance_movement();
        // A is banded, so B moves at exactly one point per tick.
        assert_eq!(snapshot.vent(VentId::B).lower(), Some(Interval::new(11, 21)));
    }

    #[test]
    fn reverse_movement_round_trips_an_observed_step() {
        let mut snapshot = StatusSnapshot::starting();
        with_reveal(&mut snapshot, VentId::C, 30);
        assert!(snapshot
            .vent_mut(VentId::A)
            .constrain(&[Interval::new(12, 22)]));
        snapshot.vent_mut(VentId::A).set_direction(MoveDirection::Up);
        let pattern = StepPattern::empty().with_step(VentId::C, 2);
        assert!(snapshot.reverse_movement(&pattern));
        assert_eq!(snapshot.vent(VentId::C).exact_value(), Some(28));
        assert_eq!(snapshot.vent(VentId::C).actual(), None);
        assert_eq!(snapshot.vent(VentId::A).lower(), Some(Interval::new(10, 20)));
    }

    #[test]
    fn reverse_movement_needs_an_anchor_value() {
        let mut snapshot = StatusSnapshot::starting();
        assert!(snapshot
            .vent_mut(VentId::A)
            .constrain(&[Interval::new(12, 22)]));
        snapshot.vent_mut(VentId::A).set_direction(MoveDirection::Up);
        assert!(!snapshot.reverse_movement(&StepPattern::empty()));
    }

    #[test]
    fn predicted_delta_bounds_track_candidate_scores() {
        let mut snapshot = StatusSnapshot::starting();
        assert_eq!(snapshot.predicted_delta_bounds(), None);
        with_reveal(&mut snapshot, VentId::A, 50);
        with_reveal(&mut snapshot, VentId::B, 50);
        with_reveal(&mut snapshot, VentId::C, 50);
        assert_eq!(
            snapshot.predicted_delta_bounds(),
            Some(DeltaBounds::new(25, 25))
        );

        let mut partial = StatusSnapshot::starting();
        with_reveal(&mut partial, VentId::B, 50);
        with_reveal(&mut partial, VentId::C, 50);
        assert!(partial
            .vent_mut(VentId::A)
            .constrain(&[Interval::new(47, 53)]));
        assert_eq!(
            partial.predicted_delta_bounds(),
            Some(DeltaBounds::new(24, 25))
        );
    }
}
