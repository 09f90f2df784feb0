#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Candidate-range bookkeeping for hidden vent values.
//!
//! A vent value is a number in `[0, 100]` that the client can only read
//! while the vent is individually visible. Because the aggregate stability
//! formula scores a value and its mirror `100 - value` identically, every
//! indirect deduction yields two mirrored candidate intervals, one per side
//! of the domain midpoint. [`VentRange`] stores those two role intervals
//! together with a hard outer envelope and keeps them tight as movement
//! ticks, freeze-band evidence and cross-branch merges arrive.
//! [`StatusSnapshot`] combines the three per-vent estimates into the joint
//! state that delta inversion and replay operate on.

mod snapshot;

pub use snapshot::{SnapshotContradiction, StatusSnapshot};

use ventwatch_core::{
    freeze_band, in_freeze_band, Interval, MoveDirection, RevealOutcome, VentId, BASE_MOVE_RATE,
    MAX_VENT_VALUE, MIN_VENT_VALUE, RESET_VALUE_HIGH, RESET_VALUE_LOW,
};

/// Inclusive bounds on the slowdown a vent receives from its influencers.
///
/// Each influencer inside the freeze band subtracts one from the base
/// movement rate. When influencer membership is only partially known the
/// contribution is a range rather than a single number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InfluenceBound {
    low: i32,
    high: i32,
}

impl InfluenceBound {
    /// No influencer can slow the vent.
    pub const NONE: InfluenceBound = InfluenceBound { low: 0, high: 0 };

    /// Some influencer certainly sits inside the freeze band.
    pub const SLOWED: InfluenceBound = InfluenceBound { low: -1, high: -1 };

    /// Influencer membership is unknown, so both contributions are possible.
    pub const UNCERTAIN: InfluenceBound = InfluenceBound { low: -1, high: 0 };

    /// Creates a bound from the two extreme contributions, ordering them.
    #[must_use]
    pub const fn new(a: i32, b: i32) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Smallest, most slowing contribution.
    #[must_use]
    pub const fn low(&self) -> i32 {
        self.low
    }

    /// Largest, least slowing contribution.
    #[must_use]
    pub const fn high(&self) -> i32 {
        self.high
    }

    /// Whether the contribution is known exactly.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.low == self.high
    }
}

/// Result of clipping candidate ranges against band-membership evidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipOutcome {
    /// The evidence removed no candidate value.
    Unchanged,
    /// At least one candidate value was removed.
    Narrowed,
    /// No candidate value survived; the ranges were cleared.
    Contradiction,
}

/// Tightest known estimate for one hidden vent value.
///
/// The two role intervals mirror each other around the domain midpoint while
/// the vent stays unrevealed; a reveal collapses both onto the reported
/// value. The outer envelope is a hard bound that candidate values never
/// escape, seeded by reset windows and widened as the true value drifts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VentRange {
    id: VentId,
    actual: Option<u8>,
    direction: MoveDirection,
    lower: Option<Interval>,
    upper: Option<Interval>,
    total_bound: Interval,
    freeze_clip_accurate: bool,
    reset_pending: bool,
}

impl VentRange {
    /// Estimate for a vent about which nothing is known yet.
    #[must_use]
    pub fn starting(id: VentId) -> Self {
        Self {
            id,
            actual: None,
            direction: MoveDirection::Unknown,
            lower: None,
            upper: None,
            total_bound: Interval::full(),
            freeze_clip_accurate: false,
            reset_pending: false,
        }
    }

    /// Estimate for a vent immediately after an in-game reset.
    ///
    /// Reset re-rolls values inside the reset window, so the window doubles
    /// as candidate range and outer envelope until fresh evidence arrives.
    /// Movement directions survive the reset.
    #[must_use]
    pub fn after_reset(id: VentId, direction: MoveDirection) -> Self {
        let window = Interval::new(RESET_VALUE_LOW, RESET_VALUE_HIGH);
        Self {
            id,
            actual: None,
            direction,
            lower: Some(window),
            upper: Some(window),
            total_bound: window,
            freeze_clip_accurate: false,
            reset_pending: true,
        }
    }

    /// Vent this estimate tracks.
    #[must_use]
    pub const fn id(&self) -> VentId {
        self.id
    }

    /// Exact revealed value, while the vent is individually visible.
    #[must_use]
    pub const fn actual(&self) -> Option<u8> {
        self.actual
    }

    /// Movement direction currently on record.
    #[must_use]
    pub const fn direction(&self) -> MoveDirection {
        self.direction
    }

    /// Replaces the movement direction on record.
    pub fn set_direction(&mut self, direction: MoveDirection) {
        self.direction = direction;
    }

    /// Candidate interval on the low side of the domain midpoint.
    #[must_use]
    pub const fn lower(&self) -> Option<Interval> {
        self.lower
    }

    /// Candidate interval on the high side of the domain midpoint.
    #[must_use]
    pub const fn upper(&self) -> Option<Interval> {
        self.upper
    }

    /// Hard outer envelope every candidate value respects.
    #[must_use]
    pub const fn total_bound(&self) -> Interval {
        self.total_bound
    }

    /// Whether any candidate interval is currently defined.
    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.lower.is_some()
    }

    /// Whether freeze-band reasoning collapsed the estimate to one value.
    #[must_use]
    pub const fn is_freeze_clip_accurate(&self) -> bool {
        self.freeze_clip_accurate
    }

    /// The single value the vent must hold, when one is known.
    ///
    /// Either the revealed value or a candidate estimate that has collapsed
    /// to a single point.
    #[must_use]
    pub fn exact_value(&self) -> Option<u8> {
        if let Some(value) = self.actual {
            return Some(value);
        }
        match (self.lower, self.upper) {
            (Some(lower), Some(upper)) if lower == upper && lower.is_point() => {
                Some(lower.start())
            }
            _ => None,
        }
    }

    /// Whether the estimate considers `value` possible.
    #[must_use]
    pub fn allows(&self, value: u8) -> bool {
        if let Some(actual) = self.actual {
            return actual == value;
        }
        match (self.lower, self.upper) {
            (Some(lower), Some(upper)) => lower.contains(value) || upper.contains(value),
            _ => self.total_bound.contains(value),
        }
    }

    /// Freeze-band membership, when every candidate value agrees on it.
    #[must_use]
    pub fn band_membership(&self) -> Option<bool> {
        if let Some(value) = self.actual {
            return Some(in_freeze_band(value));
        }
        let pieces = self.pieces();
        if pieces.is_empty() {
            return None;
        }
        let band = freeze_band();
        if pieces.iter().all(|piece| band.intersect(*piece) == Some(*piece)) {
            return Some(true);
        }
        if pieces.iter().all(|piece| !piece.overlaps(band)) {
            return Some(false);
        }
        None
    }

    /// Classification a reveal of `value` would receive, without applying it.
    #[must_use]
    pub fn classify_reveal(&self, value: u8) -> RevealOutcome {
        let Some(previous) = self.exact_value() else {
            return if self.reset_pending {
                RevealOutcome::PostReset
            } else {
                RevealOutcome::FirstSighting
            };
        };
        let diff = i32::from(value) - i32::from(previous);
        if diff == 0 {
            return RevealOutcome::Unchanged;
        }
        if self.direction.is_known() && diff.signum() == -self.direction.signum() {
            return RevealOutcome::DirectionReversed;
        }
        match diff.unsigned_abs() {
            1 => RevealOutcome::OneStep,
            2 => RevealOutcome::TwoStep,
            _ => RevealOutcome::LargeJump,
        }
    }

    /// Pins the vent to a freshly revealed value.
    ///
    /// Both role intervals collapse onto the value and the classification
    /// against the previously known value is reported back.
    pub fn reveal(&mut self, value: u8, direction: MoveDirection) -> RevealOutcome {
        let value = value.min(MAX_VENT_VALUE);
        let outcome = self.classify_reveal(value);
        let point = Interval::point(value);
        self.actual = Some(value);
        if direction.is_known() {
            self.direction = direction;
        }
        self.lower = Some(point);
        self.upper = Some(point);
        self.total_bound = self.total_bound.union_hull(point);
        self.freeze_clip_accurate = false;
        self.reset_pending = false;
        outcome
    }

    /// Switches a revealed vent back to estimation after it went hidden.
    ///
    /// The last revealed value survives as a point estimate that subsequent
    /// movement ticks widen.
    pub fn begin_estimating(&mut self) {
        if self.actual.take().is_some() {
            self.freeze_clip_accurate = false;
        }
    }

    /// Advances the estimate across one movement tick.
    ///
    /// Candidate edges move by the smallest and largest displacements they
    /// can receive given the outside slowdown bounds and their own band
    /// membership; an unknown direction widens both ways. The outer envelope
    /// always widens by the base rate since the true value moves regardless
    /// of what is known about it.
    pub fn apply_movement(&mut self, outside: InfluenceBound) {
        let base = i32::from(BASE_MOVE_RATE);
        self.total_bound = self.total_bound.shift_edges(-base, base);
        if self.actual.is_some() || !self.is_defined() {
            return;
        }
        let moved: Vec<Interval> = self
            .pieces()
            .into_iter()
            .map(|piece| shift_piece(piece, self.direction, outside))
            .collect();
        self.assign_pieces(moved);
        if self.freeze_clip_accurate {
            self.freeze_clip_accurate = self.exact_value().is_some();
        }
    }

    /// Restricts the candidate ranges by freeze-band membership evidence.
    ///
    /// `inner` keeps only values inside `band`, otherwise only values
    /// outside it survive. A revealed vent is checked rather than clipped.
    /// Evidence that removes every candidate clears the estimate, and an
    /// undefined estimate adopts the evidence as its first real information.
    pub fn clip_to_band(&mut self, band: Interval, inner: bool) -> ClipOutcome {
        if let Some(value) = self.actual {
            return if band.contains(value) == inner {
                ClipOutcome::Unchanged
            } else {
                ClipOutcome::Contradiction
            };
        }
        if !self.is_defined() {
            let seeded: Vec<Interval> = if inner {
                band.intersect(self.total_bound).into_iter().collect()
            } else {
                let (left, right) = self.total_bound.subtract(band);
                left.into_iter().chain(right).collect()
            };
            if seeded.is_empty() {
                return ClipOutcome::Contradiction;
            }
            self.assign_pieces(seeded);
            return ClipOutcome::Narrowed;
        }
        let before = (self.lower, self.upper);
        let mut survivors = Vec::new();
        for piece in self.pieces() {
            if inner {
                if let Some(kept) = piece.intersect(band) {
                    survivors.push(kept);
                }
            } else {
                let (left, right) = piece.subtract(band);
                survivors.extend(left);
                survivors.extend(right);
            }
        }
        self.assign_pieces(survivors);
        if !self.is_defined() {
            return ClipOutcome::Contradiction;
        }
        if (self.lower, self.upper) == before {
            return ClipOutcome::Unchanged;
        }
        if self.exact_value().is_some() {
            self.freeze_clip_accurate = true;
        }
        ClipOutcome::Narrowed
    }

    /// Widens the estimate to also cover everything `other` considers
    /// possible.
    ///
    /// Used when parallel interpretation branches fold back together, so an
    /// undefined side makes the union undefined as well. Roles are hulled
    /// pairwise, which keeps mirrored splits split instead of bridging them.
    pub fn merge_with(&mut self, other: &VentRange) {
        self.total_bound = self.total_bound.union_hull(other.total_bound);
        self.reset_pending &= other.reset_pending;
        if self.actual.is_some() && self.actual == other.actual {
            return;
        }
        if self.actual != other.actual {
            self.actual = None;
        }
        let (Some(self_lower), Some(self_upper)) = (self.lower, self.upper) else {
            self.clear_ranges();
            return;
        };
        let (Some(other_lower), Some(other_upper)) = (other.lower, other.upper) else {
            self.clear_ranges();
            return;
        };
        let accurate = self.freeze_clip_accurate && other.freeze_clip_accurate;
        self.assign_pieces(vec![
            self_lower.union_hull(other_lower),
            self_upper.union_hull(other_upper),
        ]);
        self.freeze_clip_accurate = accurate && self.exact_value().is_some();
    }

    /// Narrows the estimate to values both estimates consider possible.
    ///
    /// Returns `false` when the two estimates share no candidate value; the
    /// ranges are cleared in that case. Callers that must not lose state
    /// intersect a clone and commit on success.
    pub fn intersect_with(&mut self, other: &VentRange) -> bool {
        if !other.is_defined() {
            return true;
        }
        if let Some(bound) = self.total_bound.intersect(other.total_bound) {
            self.total_bound = bound;
        }
        if let Some(value) = self.actual {
            return other.allows(value);
        }
        self.constrain(&other.pieces())
    }

    /// Rewinds the estimate across one movement tick.
    ///
    /// Returns `false` without touching the estimate when the rewind would
    /// be unsound: the direction is unknown, or an edge sits on a domain
    /// bound where forward clamping makes the preimage unbounded.
    pub fn reverse_one_tick(&mut self, outside: InfluenceBound) -> bool {
        if !self.direction.is_known() {
            return false;
        }
        if let Some(value) = self.actual {
            // A value revealed later is only a candidate point earlier on.
            let point = Interval::point(value);
            self.actual = None;
            self.lower = Some(point);
            self.upper = Some(point);
        }
        let (Some(lower), Some(upper)) = (self.lower, self.upper) else {
            return true;
        };
        let clamp_risk = match self.direction {
            MoveDirection::Up => upper.end() == MAX_VENT_VALUE || lower.end() == MAX_VENT_VALUE,
            MoveDirection::Down => {
                lower.start() == MIN_VENT_VALUE || upper.start() == MIN_VENT_VALUE
            }
            MoveDirection::Unknown => true,
        };
        if clamp_risk {
            return false;
        }
        let rewound: Vec<Interval> = self
            .pieces()
            .into_iter()
            .map(|piece| rewind_piece(piece, self.direction, outside))
            .collect();
        self.assign_pieces(rewound);
        self.freeze_clip_accurate = false;
        true
    }

    /// Narrows the estimate against externally derived candidate pieces.
    ///
    /// An undefined estimate adopts the pieces; a defined one keeps only the
    /// pairwise overlaps. Returns `false` and clears the ranges when nothing
    /// survives.
    pub(crate) fn constrain(&mut self, constraints: &[Interval]) -> bool {
        if let Some(value) = self.actual {
            return constraints.iter().any(|piece| piece.contains(value));
        }
        if constraints.is_empty() {
            self.clear_ranges();
            return false;
        }
        if !self.is_defined() {
            self.assign_pieces(constraints.to_vec());
            return self.is_defined();
        }
        let before = (self.lower, self.upper);
        let mut survivors = Vec::new();
        for mine in self.pieces() {
            for constraint in constraints {
                if let Some(shared) = mine.intersect(*constraint) {
                    survivors.push(shared);
                }
            }
        }
        self.assign_pieces(survivors);
        if !self.is_defined() {
            return false;
        }
        if (self.lower, self.upper) != before && self.freeze_clip_accurate {
            self.freeze_clip_accurate = self.exact_value().is_some();
        }
        true
    }

    /// Drops every candidate value, marking the estimate undefined.
    pub(crate) fn clear_ranges(&mut self) {
        self.lower = None;
        self.upper = None;
        self.freeze_clip_accurate = false;
    }

    /// Replaces the candidate ranges with a single exactly-known point.
    pub(crate) fn set_point_estimate(&mut self, value: u8) {
        let point = Interval::point(value.min(MAX_VENT_VALUE));
        self.actual = None;
        self.lower = Some(point);
        self.upper = Some(point);
        self.total_bound = self.total_bound.union_hull(point);
        self.freeze_clip_accurate = false;
    }

    /// Distinct candidate pieces, at most two.
    fn pieces(&self) -> Vec<Interval> {
        match (self.lower, self.upper) {
            (Some(lower), Some(upper)) if lower == upper => vec![lower],
            (Some(lower), Some(upper)) => vec![lower, upper],
            _ => Vec::new(),
        }
    }

    /// Clamps raw pieces to the envelope and redistributes them into roles.
    fn assign_pieces(&mut self, pieces: Vec<Interval>) {
        let bounded: Vec<Interval> = pieces
            .into_iter()
            .filter_map(|piece| piece.intersect(self.total_bound))
            .collect();
        let (lower, upper) = normalize_pieces(bounded);
        self.lower = lower;
        self.upper = upper;
        if !self.is_defined() {
            self.freeze_clip_accurate = false;
        }
    }
}

/// Sorts, merges and redistributes raw interval pieces into the two
/// mirrored roles.
///
/// Zero pieces mean a contradiction, leaving both roles undefined. A single
/// piece occupies both roles. With more than two pieces the two closest
/// neighbours are hulled together repeatedly until exactly two remain.
fn normalize_pieces(mut pieces: Vec<Interval>) -> (Option<Interval>, Option<Interval>) {
    pieces.sort_by_key(|piece| (piece.start(), piece.end()));
    let mut merged: Vec<Interval> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if let Some(last) = merged.last_mut() {
            if last.touches_or_overlaps(piece) {
                *last = last.union_hull(piece);
                continue;
            }
        }
        merged.push(piece);
    }
    while merged.len() > 2 {
        let mut tightest = 0;
        let mut smallest_gap = u8::MAX;
        for index in 0..merged.len() - 1 {
            let gap = merged[index + 1].start().saturating_sub(merged[index].end());
            if gap < smallest_gap {
                smallest_gap = gap;
                tightest = index;
            }
        }
        let hull = merged[tightest].union_hull(merged[tightest + 1]);
        merged[tightest] = hull;
        let _ = merged.remove(tightest + 1);
    }
    match (merged.first().copied(), merged.last().copied()) {
        (Some(first), Some(last)) => (Some(first), Some(last)),
        _ => (None, None),
    }
}

/// Moves a candidate piece across one movement tick.
fn shift_piece(piece: Interval, direction: MoveDirection, outside: InfluenceBound) -> Interval {
    let start = piece.start();
    let end = piece.end();
    match direction {
        MoveDirection::Up => piece.shift_edges(
            min_displacement(start, outside),
            max_displacement(end, outside),
        ),
        MoveDirection::Down => piece.shift_edges(
            -max_displacement(start, outside),
            -min_displacement(end, outside),
        ),
        MoveDirection::Unknown => piece.shift_edges(
            -max_displacement(start, outside),
            max_displacement(end, outside),
        ),
    }
}

/// Rewinds a candidate piece across one movement tick.
///
/// Each edge tries the banded and the unbanded preimage and keeps the one
/// whose own band membership is consistent with the displacement used. When
/// both or neither are consistent the widening choice wins, which keeps the
/// rewind sound at the cost of a point of precision.
fn rewind_piece(piece: Interval, direction: MoveDirection, outside: InfluenceBound) -> Interval {
    let sign = direction.signum();
    let (start_rate, end_rate) = match direction {
        MoveDirection::Up => (outside.low(), outside.high()),
        _ => (outside.high(), outside.low()),
    };
    let start = rewind_edge(piece.start(), sign, start_rate, true);
    let end = rewind_edge(piece.end(), sign, end_rate, false);
    Interval::new(start, end)
}

fn rewind_edge(edge: u8, sign: i32, outside: i32, prefer_low: bool) -> u8 {
    let banded = rewind_candidate(edge, sign, outside, true);
    let unbanded = rewind_candidate(edge, sign, outside, false);
    match (in_freeze_band(banded), !in_freeze_band(unbanded)) {
        (true, false) => banded,
        (false, true) => unbanded,
        _ => {
            if prefer_low {
                banded.min(unbanded)
            } else {
                banded.max(unbanded)
            }
        }
    }
}

fn rewind_candidate(edge: u8, sign: i32, outside: i32, banded: bool) -> u8 {
    let own = if banded { -1 } else { 0 };
    let displacement = (i32::from(BASE_MOVE_RATE) + outside + own).max(0);
    clamp_value(i32::from(edge) - sign * displacement)
}

fn min_displacement(value: u8, outside: InfluenceBound) -> i32 {
    displacement(value, outside.low())
}

fn max_displacement(value: u8, outside: InfluenceBound) -> i32 {
    displacement(value, outside.high())
}

/// Per-tick displacement of a vent value given the outside contribution.
fn displacement(value: u8, outside: i32) -> i32 {
    let own = if in_freeze_band(value) { -1 } else { 0 };
    (i32::from(BASE_MOVE_RATE) + outside + own).max(0)
}

fn clamp_value(raw: i32) -> u8 {
    raw.clamp(i32::from(MIN_VENT_VALUE), i32::from(MAX_VENT_VALUE)) as u8
}

#[cfg(test)]
mod tests {
    use super::{ClipOutcome, InfluenceBound, VentRange};
    use ventwatch_core::{freeze_band, Interval, MoveDirection, RevealOutcome, VentId};

    fn defined(vent: VentId, pieces: &[Interval]) -> VentRange {
        let mut range = VentRange::starting(vent);
        assert!(range.constrain(pieces));
        range
    }

    #[test]
    fn movement_with_uncertain_influence_widens_the_estimate() {
        let mut range = defined(VentId::B, &[Interval::new(30, 40)]);
        range.set_direction(MoveDirection::Up);
        range.apply_movement(InfluenceBound::UNCERTAIN);
        assert_eq!(range.lower(), Some(Interval::new(31, 42)));
        assert_eq!(range.upper(), Some(Interval::new(31, 42)));
    }

    #[test]
    fn movement_down_shifts_both_roles() {
        let mut range = defined(
            VentId::C,
            &[Interval::new(30, 40), Interval::new(60, 70)],
        );
        range.set_direction(MoveDirection::Down);
        range.apply_movement(InfluenceBound::NONE);
        assert_eq!(range.lower(), Some(Interval::new(28, 38)));
        assert_eq!(range.upper(), Some(Interval::new(58, 68)));
    }

    #[test]
    fn movement_with_unknown_direction_widens_both_ways() {
        let mut range = defined(VentId::A, &[Interval::new(20, 24)]);
        range.apply_movement(InfluenceBound::NONE);
        assert_eq!(range.lower(), Some(Interval::new(18, 26)));
    }

    #[test]
    fn movement_clamps_at_the_domain_edge() {
        let mut range = defined(VentId::A, &[Interval::new(95, 99)]);
        range.set_direction(MoveDirection::Up);
        range.apply_movement(InfluenceBound::NONE);
        assert_eq!(range.lower(), Some(Interval::new(97, 100)));
    }

    #[test]
    fn inner_clip_keeps_only_banded_values() {
        let mut range = defined(
            VentId::B,
            &[Interval::new(30, 45), Interval::new(55, 70)],
        );
        assert_eq!(range.clip_to_band(freeze_band(), true), ClipOutcome::Narrowed);
        assert_eq!(range.lower(), Some(Interval::new(41, 45)));
        assert_eq!(range.upper(), Some(Interval::new(55, 59)));
    }

    #[test]
    fn outer_clip_carves_the_band_out() {
        let mut range = defined(
            VentId::B,
            &[Interval::new(30, 45), Interval::new(55, 70)],
        );
        assert_eq!(range.clip_to_band(freeze_band(), false), ClipOutcome::Narrowed);
        assert_eq!(range.lower(), Some(Interval::new(30, 40)));
        assert_eq!(range.upper(), Some(Interval::new(60, 70)));
    }

    #[test]
    fn contradictory_clip_clears_the_estimate() {
        let mut range = defined(VentId::B, &[Interval::new(41, 59)]);
        assert_eq!(
            range.clip_to_band(freeze_band(), false),
            ClipOutcome::Contradiction
        );
        assert!(!range.is_defined());
        assert!(!range.is_freeze_clip_accurate());
    }

    #[test]
    fn clip_that_collapses_to_a_point_is_marked_accurate() {
        let mut range = defined(VentId::C, &[Interval::new(40, 41)]);
        assert_eq!(range.clip_to_band(freeze_band(), true), ClipOutcome::Narrowed);
        assert_eq!(range.exact_value(), Some(41));
        assert!(range.is_freeze_clip_accurate());
    }

    #[test]
    fn clip_seeds_an_undefined_estimate() {
        let mut range = VentRange::starting(VentId::A);
        assert_eq!(range.clip_to_band(freeze_band(), true), ClipOutcome::Narrowed);
        assert_eq!(range.lower(), Some(Interval::new(41, 59)));
        assert_eq!(range.upper(), Some(Interval::new(41, 59)));
    }

    #[test]
    fn reveal_classifications_follow_the_recorded_state() {
        let mut range = VentRange::starting(VentId::A);
        assert_eq!(range.reveal(60, MoveDirection::Up), RevealOutcome::FirstSighting);
        assert_eq!(range.reveal(60, MoveDirection::Up), RevealOutcome::Unchanged);
        assert_eq!(range.reveal(62, MoveDirection::Up), RevealOutcome::TwoStep);
        assert_eq!(range.reveal(63, MoveDirection::Up), RevealOutcome::OneStep);
        assert_eq!(range.reveal(75, MoveDirection::Up), RevealOutcome::LargeJump);
        assert_eq!(
            range.reveal(74, MoveDirection::Down),
            RevealOutcome::DirectionReversed
        );
    }

    #[test]
    fn reveal_after_reset_is_classified_as_post_reset() {
        let mut range = VentRange::after_reset(VentId::B, MoveDirection::Down);
        assert_eq!(range.reveal(30, MoveDirection::Down), RevealOutcome::PostReset);
    }

    #[test]
    fn begin_estimating_keeps_the_last_value_as_a_point() {
        let mut range = VentRange::starting(VentId::C);
        let _ = range.reveal(62, MoveDirection::Up);
        range.begin_estimating();
        assert_eq!(range.actual(), None);
        assert_eq!(range.exact_value(), Some(62));
    }

    #[test]
    fn rewind_inverts_an_interior_move_exactly() {
        let mut range = defined(VentId::B, &[Interval::new(45, 55)]);
        range.set_direction(MoveDirection::Up);
        range.apply_movement(InfluenceBound::NONE);
        assert_eq!(range.lower(), Some(Interval::new(46, 56)));
        assert!(range.reverse_one_tick(InfluenceBound::NONE));
        assert_eq!(range.lower(), Some(Interval::new(45, 55)));
        assert_eq!(range.upper(), Some(Interval::new(45, 55)));
    }

    #[test]
    fn rewind_inverts_an_unbanded_move_exactly() {
        let mut range = defined(VentId::A, &[Interval::new(10, 20)]);
        range.set_direction(MoveDirection::Up);
        range.apply_movement(InfluenceBound::NONE);
        assert_eq!(range.lower(), Some(Interval::new(12, 22)));
        assert!(range.reverse_one_tick(InfluenceBound::NONE));
        assert_eq!(range.lower(), Some(Interval::new(10, 20)));
    }

    #[test]
    fn rewind_refuses_unknown_directions_and_clamped_edges() {
        let mut unknown = defined(VentId::A, &[Interval::new(30, 40)]);
        assert!(!unknown.reverse_one_tick(InfluenceBound::NONE));
        assert_eq!(unknown.lower(), Some(Interval::new(30, 40)));

        let mut clamped = defined(VentId::A, &[Interval::new(95, 99)]);
        clamped.set_direction(MoveDirection::Up);
        clamped.apply_movement(InfluenceBound::NONE);
        assert_eq!(clamped.lower(), Some(Interval::new(97, 100)));
        assert!(!clamped.reverse_one_tick(InfluenceBound::NONE));
    }

    #[test]
    fn merge_hulls_each_role_separately() {
        let mut split = defined(
            VentId::B,
            &[Interval::new(30, 35), Interval::new(65, 70)],
        );
        let other = defined(
            VentId::B,
            &[Interval::new(28, 33), Interval::new(67, 72)],
        );
        split.merge_with(&other);
        assert_eq!(split.lower(), Some(Interval::new(28, 35)));
        assert_eq!(split.upper(), Some(Interval::new(65, 72)));
    }

    #[test]
    fn merge_with_an_undefined_estimate_is_undefined() {
        let mut range = defined(VentId::B, &[Interval::new(30, 40)]);
        range.merge_with(&VentRange::starting(VentId::B));
        assert!(!range.is_defined());
    }

    #[test]
    fn intersect_keeps_pairwise_overlaps() {
        let mut range = defined(
            VentId::C,
            &[Interval::new(30, 45), Interval::new(55, 70)],
        );
        let other = defined(VentId::C, &[Interval::new(40, 60)]);
        assert!(range.intersect_with(&other));
        assert_eq!(range.lower(), Some(Interval::new(40, 45)));
        assert_eq!(range.upper(), Some(Interval::new(55, 60)));
    }

    #[test]
    fn disjoint_intersection_clears_and_reports_contradiction() {
        let mut range = defined(VentId::C, &[Interval::new(10, 20)]);
        let other = defined(VentId::C, &[Interval::new(80, 90)]);
        assert!(!range.intersect_with(&other));
        assert!(!range.is_defined());
    }

    #[test]
    fn intersecting_an_undefined_estimate_adopts_the_constraint() {
        let mut range = VentRange::starting(VentId::A);
        let other = defined(VentId::A, &[Interval::new(47, 53)]);
        assert!(range.intersect_with(&other));
        assert_eq!(range.lower(), Some(Interval::new(47, 53)));
    }

    #[test]
    fn revealed_values_accept_or_reject_constraints() {
        let mut range = VentRange::starting(VentId::A);
        let _ = range.reveal(50, MoveDirection::Up);
        let compatible = defined(VentId::A, &[Interval::new(47, 53)]);
        let incompatible = defined(VentId::A, &[Interval::new(10, 20)]);
        assert!(range.clone().intersect_with(&compatible));
        assert!(!range.intersect_with(&incompatible));
    }

    #[test]
    fn excess_pieces_hull_the_tightest_gap() {
        let range = defined(
            VentId::A,
            &[
                Interval::new(10, 20),
                Interval::new(30, 40),
                Interval::new(90, 100),
            ],
        );
        assert_eq!(range.lower(), Some(Interval::new(10, 40)));
        assert_eq!(range.upper(), Some(Interval::new(90, 100)));
    }

    #[test]
    fn envelope_widens_with_movement_and_limits_candidates() {
        let mut range = VentRange::after_reset(VentId::A, MoveDirection::Up);
        assert_eq!(range.total_bound(), Interval::new(25, 75));
        range.apply_movement(InfluenceBound::UNCERTAIN);
        assert_eq!(range.total_bound(), Interval::new(23, 77));
        assert_eq!(range.lower(), Some(Interval::new(26, 77)));
    }
}
