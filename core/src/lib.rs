#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the ventwatch engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative tracker, and pure systems. Adapters submit [`Command`] values
//! carrying raw observations pulled from the game client, the tracker executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values describing what the inference engine learned. Systems consume those
//! payloads deterministically; all shared vocabulary lives here.

use serde::{Deserialize, Serialize};

/// Lowest value a vent can report.
pub const MIN_VENT_VALUE: u8 = 0;

/// Highest value a vent can report.
pub const MAX_VENT_VALUE: u8 = 100;

/// Midpoint value at which a vent contributes maximum stability.
pub const PERFECT_VENT_VALUE: u8 = 50;

/// Lowest value inside the freeze band, inclusive.
pub const FREEZE_BAND_LOW: u8 = 41;

/// Highest value inside the freeze band, inclusive.
pub const FREEZE_BAND_HIGH: u8 = 59;

/// Distance a vent travels per movement tick before slowdowns apply.
pub const BASE_MOVE_RATE: u8 = 2;

/// Number of game ticks between periodic vent movements.
pub const MOVEMENT_TICK_PERIOD: u32 = 10;

/// Number of game ticks between aggregate stability updates.
pub const STABILITY_UPDATE_PERIOD: u32 = 25;

/// Upper bound on the number of ticks a single game instance can span.
pub const MAX_GAME_TICKS: u32 = 1000;

/// Lowest value a vent can hold immediately after an in-game reset.
pub const RESET_VALUE_LOW: u8 = 25;

/// Highest value a vent can hold immediately after an in-game reset.
pub const RESET_VALUE_HIGH: u8 = 75;

/// Ticks without a fresh stability update before the stall clip may fire.
pub const STALL_CLIP_TICKS: u32 = 50;

/// Maximum number of live replay hypotheses carried at once.
pub const MAX_BRANCHES: usize = 3;

/// Most negative true stability delta a full update can produce.
pub const MIN_STABILITY_DELTA: i32 = -25;

/// Most positive true stability delta a full update can produce.
pub const MAX_STABILITY_DELTA: i32 = 25;

/// Smallest supported mining team size.
pub const MIN_TEAM_SIZE: u8 = 1;

/// Largest supported mining team size.
pub const MAX_TEAM_SIZE: u8 = 5;

/// Commands that express all permissible tracker mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the tracker configuration and restarts inference from scratch.
    Configure {
        /// Configuration the tracker should adopt.
        config: InferenceConfig,
    },
    /// Advances the tracker by one game tick with fresh client observations.
    IngestTick {
        /// Per-vent value readings in canonical vent order.
        readings: [VentReading; 3],
        /// Per-vent movement directions reported by the client.
        directions: DirectionMask,
    },
    /// Records the raw aggregate stability delta observed on the current tick.
    IngestStabilityDelta {
        /// Observed delta, including the hidden per-update modifier.
        raw_delta: i32,
    },
    /// Marks the in-game vent reset that hides all vents and re-rolls values.
    ResetVents,
}

/// Events broadcast by the tracker after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that a configuration was adopted.
    TrackerConfigured {
        /// Configuration now in effect.
        config: InferenceConfig,
    },
    /// Reports that a hidden vent became individually visible.
    VentIdentified {
        /// Tick on which the reveal was observed.
        tick: GameTick,
        /// Vent that became visible.
        vent: VentId,
        /// Exact value the vent reported.
        value: u8,
        /// Classification of the reveal against the previous known value.
        outcome: RevealOutcome,
    },
    /// Reports that a vent's movement direction flipped.
    DirectionChanged {
        /// Tick on which the new direction was observed.
        tick: GameTick,
        /// Vent whose direction changed.
        vent: VentId,
        /// Direction now in effect.
        direction: MoveDirection,
    },
    /// Reports an observed periodic movement and its per-vent step sizes.
    MovementObserved {
        /// Tick on which the movement landed.
        tick: GameTick,
        /// Step magnitudes measured for the vents that were visible.
        pattern: StepPattern,
    },
    /// Reports a movement tick synthesized from a stability update's timing.
    MovementInferred {
        /// Tick the movement is assumed to have landed on.
        tick: GameTick,
    },
    /// Confirms that a raw stability delta was recorded.
    StabilityUpdateRecorded {
        /// Tick on which the update was observed.
        tick: GameTick,
        /// Raw delta as reported by the client.
        raw_delta: i32,
    },
    /// Reports that a past update's hidden modifier was narrowed to one value.
    ModifierPinned {
        /// Tick of the stability update whose modifier became certain.
        tick: GameTick,
        /// The only modifier still consistent with the evidence.
        modifier: i32,
    },
    /// Reports that an observation was dropped instead of being applied.
    ObservationDiscarded {
        /// Tick of the discarded observation.
        tick: GameTick,
        /// Why the observation could not be applied.
        reason: DiscardReason,
    },
    /// Reports a tick where vents held still despite an expected movement.
    AnomalyDetected {
        /// Tick on which movement failed to appear.
        tick: GameTick,
    },
    /// Confirms that the in-game vent reset was recorded.
    VentsReset {
        /// Tick on which the reset was observed.
        tick: GameTick,
    },
    /// Reports that the operator-facing estimate changed.
    EstimateUpdated {
        /// Fresh display payload.
        display: DisplayState,
    },
}

/// Reasons the tracker discards an observation instead of applying it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// Evidence would empty a candidate range entirely.
    Contradiction,
    /// A movement reversal could not be attributed to a single tick.
    AmbiguousReversal,
    /// Every plausible modifier for a stability update was eliminated.
    StaleModifier,
}

/// Identifies one of the three tracked vents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VentId {
    /// First vent; moves at the base rate regardless of its siblings.
    A,
    /// Second vent; slowed while vent A sits inside the freeze band.
    B,
    /// Third vent; slowed while vent A or vent B sits inside the freeze band.
    C,
}

impl VentId {
    /// All vents in canonical order.
    pub const ALL: [VentId; 3] = [VentId::A, VentId::B, VentId::C];

    /// Zero-based position of the vent in canonical order.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            VentId::A => 0,
            VentId::B => 1,
            VentId::C => 2,
        }
    }

    /// Single-letter label used by operator-facing surfaces.
    #[must_use]
    pub const fn label(self) -> char {
        match self {
            VentId::A => 'A',
            VentId::B => 'B',
            VentId::C => 'C',
        }
    }

    /// Vents whose freeze-band membership slows this vent's movement.
    #[must_use]
    pub const fn influencers(self) -> &'static [VentId] {
        match self {
            VentId::A => &[],
            VentId::B => &[VentId::A],
            VentId::C => &[VentId::A, VentId::B],
        }
    }
}

/// Direction a vent's value is currently drifting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    /// The value shrinks on movement ticks.
    Down,
    /// The direction has not been observed yet.
    Unknown,
    /// The value grows on movement ticks.
    Up,
}

impl MoveDirection {
    /// Sign of the displacement applied on movement ticks.
    #[must_use]
    pub const fn signum(self) -> i32 {
        match self {
            MoveDirection::Down => -1,
            MoveDirection::Unknown => 0,
            MoveDirection::Up => 1,
        }
    }

    /// The opposite direction; `Unknown` reverses to itself.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            MoveDirection::Down => MoveDirection::Up,
            MoveDirection::Unknown => MoveDirection::Unknown,
            MoveDirection::Up => MoveDirection::Down,
        }
    }

    /// Whether the direction carries real information.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, MoveDirection::Unknown)
    }

    /// Single-character arrow used by operator-facing surfaces.
    #[must_use]
    pub const fn arrow(self) -> char {
        match self {
            MoveDirection::Down => 'v',
            MoveDirection::Unknown => '?',
            MoveDirection::Up => '^',
        }
    }
}

/// Compact per-vent direction flags as delivered by the game client.
///
/// Bit `i` of the mask is set when the vent at canonical index `i` is moving
/// upward and cleared when it is moving downward. The client always reports a
/// concrete direction for every vent, so a mask never encodes `Unknown`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectionMask(u8);

impl DirectionMask {
    /// Wraps raw client bits, ignoring anything above the low three.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// Raw bit representation of the mask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Direction the mask reports for the provided vent.
    #[must_use]
    pub const fn direction_of(self, vent: VentId) -> MoveDirection {
        if self.0 & (1 << vent.index()) != 0 {
            MoveDirection::Up
        } else {
            MoveDirection::Down
        }
    }

    /// Copy of the mask with the provided vent marked as moving upward.
    #[must_use]
    pub const fn with_upward(self, vent: VentId) -> Self {
        Self(self.0 | (1 << vent.index()))
    }

    /// Copy of the mask with the provided vent marked as moving downward.
    #[must_use]
    pub const fn with_downward(self, vent: VentId) -> Self {
        Self(self.0 & !(1 << vent.index()) & 0b111)
    }
}

/// Index of a game tick since the tracker was configured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameTick(u32);

impl GameTick {
    /// Creates a tick index with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tick.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Position of the tick within a dense tick-indexed table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The tick that immediately follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Number of ticks elapsed since an earlier tick, saturating at zero.
    #[must_use]
    pub const fn ticks_since(self, earlier: GameTick) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Inclusive range of candidate vent values.
///
/// Intervals are always ordered and clamped to the value domain on
/// construction, so every instance satisfies `start <= end <= 100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    start: u8,
    end: u8,
}

impl Interval {
    /// Creates an interval from two endpoints, ordering and clamping them.
    #[must_use]
    pub const fn new(a: u8, b: u8) -> Self {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let start = if start > MAX_VENT_VALUE {
            MAX_VENT_VALUE
        } else {
            start
        };
        let end = if end > MAX_VENT_VALUE {
            MAX_VENT_VALUE
        } else {
            end
        };
        Self { start, end }
    }

    /// Creates the single-value interval `[value, value]`.
    #[must_use]
    pub const fn point(value: u8) -> Self {
        Self::new(value, value)
    }

    /// The entire value domain `[0, 100]`.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            start: MIN_VENT_VALUE,
            end: MAX_VENT_VALUE,
        }
    }

    /// Lowest value contained in the interval.
    #[must_use]
    pub const fn start(&self) -> u8 {
        self.start
    }

    /// Highest value contained in the interval.
    #[must_use]
    pub const fn end(&self) -> u8 {
        self.end
    }

    /// Distance between the endpoints; a point interval has width zero.
    #[must_use]
    pub const fn width(&self) -> u8 {
        self.end - self.start
    }

    /// Whether the interval contains exactly one value.
    #[must_use]
    pub const fn is_point(&self) -> bool {
        self.start == self.end
    }

    /// Whether the provided value lies inside the interval.
    #[must_use]
    pub const fn contains(&self, value: u8) -> bool {
        self.start <= value && value <= self.end
    }

    /// Whether the two intervals share at least one value.
    #[must_use]
    pub const fn overlaps(&self, other: Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Whether the two intervals overlap or sit directly adjacent.
    #[must_use]
    pub const fn touches_or_overlaps(&self, other: Interval) -> bool {
        self.start <= other.end.saturating_add(1) && other.start <= self.end.saturating_add(1)
    }

    /// Smallest interval containing both inputs.
    #[must_use]
    pub const fn union_hull(&self, other: Interval) -> Interval {
        let start = if self.start < other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end > other.end {
            self.end
        } else {
            other.end
        };
        Interval { start, end }
    }

    /// Largest interval contained in both inputs, if any.
    #[must_use]
    pub const fn intersect(&self, other: Interval) -> Option<Interval> {
        let start = if self.start > other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end < other.end { self.end } else { other.end };
        if start <= end {
            Some(Interval { start, end })
        } else {
            None
        }
    }

    /// Removes `hole` from the interval, yielding the surviving pieces on
    /// each side of the hole.
    #[must_use]
    pub fn subtract(&self, hole: Interval) -> (Option<Interval>, Option<Interval>) {
        let left = if self.start < hole.start {
            Some(Interval::new(self.start, self.end.min(hole.start - 1)))
        } else {
            None
        };
        let right = if self.end > hole.end {
            Some(Interval::new(self.start.max(hole.end + 1), self.end))
        } else {
            None
        };
        (left, right)
    }

    /// Moves each endpoint by its own signed offset, clamping to the domain.
    #[must_use]
    pub fn shift_edges(&self, start_offset: i32, end_offset: i32) -> Interval {
        let start = clamp_to_domain(i32::from(self.start) + start_offset);
        let end = clamp_to_domain(i32::from(self.end) + end_offset);
        Interval::new(start, end)
    }

    /// The interval reflected around the midpoint of the value domain.
    #[must_use]
    pub const fn mirrored(&self) -> Interval {
        Interval {
            start: MAX_VENT_VALUE - self.end,
            end: MAX_VENT_VALUE - self.start,
        }
    }
}

/// The inclusive band of values inside which vents move one point slower.
#[must_use]
pub const fn freeze_band() -> Interval {
    Interval {
        start: FREEZE_BAND_LOW,
        end: FREEZE_BAND_HIGH,
    }
}

/// Whether the provided value lies inside the freeze band.
#[must_use]
pub const fn in_freeze_band(value: u8) -> bool {
    FREEZE_BAND_LOW <= value && value <= FREEZE_BAND_HIGH
}

/// Stability contribution of a single vent value, between 0 and 50.
///
/// The contribution peaks at [`PERFECT_VENT_VALUE`] and falls off linearly
/// toward both ends of the value domain.
#[must_use]
pub const fn stability_score(value: u8) -> u8 {
    let clamped = if value > MAX_VENT_VALUE {
        MAX_VENT_VALUE
    } else {
        value
    };
    PERFECT_VENT_VALUE - PERFECT_VENT_VALUE.abs_diff(clamped)
}

/// True aggregate stability delta produced by the provided vent values.
///
/// The per-vent scores are averaged with flooring integer division and offset
/// so that three perfect vents yield [`MAX_STABILITY_DELTA`] and three
/// extreme vents yield [`MIN_STABILITY_DELTA`].
#[must_use]
pub const fn stability_delta(values: [u8; 3]) -> i32 {
    let total = stability_score(values[0]) as i32
        + stability_score(values[1]) as i32
        + stability_score(values[2]) as i32;
    total / 3 - MAX_STABILITY_DELTA
}

/// Per-tick client reading for a single vent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VentReading {
    /// The vent's value is hidden from the client this tick.
    Hidden,
    /// The vent's value is visible and reports the contained percentage.
    Visible(u8),
}

impl VentReading {
    /// The visible value, if any.
    #[must_use]
    pub const fn value(self) -> Option<u8> {
        match self {
            VentReading::Hidden => None,
            VentReading::Visible(value) => Some(value),
        }
    }

    /// Whether the reading carries a visible value.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, VentReading::Visible(_))
    }
}

/// Observed per-vent step magnitudes for a single movement tick.
///
/// A vent only contributes a step when it was visible both before and after
/// the movement; hidden vents stay `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepPattern {
    steps: [Option<u8>; 3],
}

impl StepPattern {
    /// A pattern with no observed steps.
    #[must_use]
    pub const fn empty() -> Self {
        Self { steps: [None; 3] }
    }

    /// Copy of the pattern with the provided vent's step magnitude recorded.
    #[must_use]
    pub const fn with_step(mut self, vent: VentId, magnitude: u8) -> Self {
        self.steps[vent.index()] = Some(magnitude);
        self
    }

    /// Step magnitude observed for the provided vent, if any.
    #[must_use]
    pub const fn step_of(&self, vent: VentId) -> Option<u8> {
        self.steps[vent.index()]
    }

    /// Number of vents that contributed an observed step.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.steps.iter().filter(|step| step.is_some()).count()
    }

    /// Whether no vent contributed an observed step.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observed_count() == 0
    }
}

/// Classification of a vent reveal against the previous known value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RevealOutcome {
    /// The vent had never been seen before.
    FirstSighting,
    /// The value matches the previous known value exactly.
    Unchanged,
    /// The value moved one point since the previous known value.
    OneStep,
    /// The value moved two points since the previous known value.
    TwoStep,
    /// The value moved more than one movement tick can explain.
    LargeJump,
    /// The value moved against the direction on record.
    DirectionReversed,
    /// First sighting after an in-game vent reset.
    PostReset,
}

/// Tunable inference parameters supplied by the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InferenceConfig {
    team_size: u8,
}

impl InferenceConfig {
    /// Creates a configuration, clamping the team size to the supported span.
    #[must_use]
    pub const fn new(team_size: u8) -> Self {
        let team_size = if team_size < MIN_TEAM_SIZE {
            MIN_TEAM_SIZE
        } else if team_size > MAX_TEAM_SIZE {
            MAX_TEAM_SIZE
        } else {
            team_size
        };
        Self { team_size }
    }

    /// Number of players in the mining team.
    #[must_use]
    pub const fn team_size(&self) -> u8 {
        self.team_size
    }

    /// Most negative modifier a stability update can hide.
    #[must_use]
    pub const fn modifier_low(&self) -> i32 {
        -(self.team_size as i32 + 1)
    }

    /// Least negative modifier a stability update can hide.
    #[must_use]
    pub const fn modifier_high(&self) -> i32 {
        0
    }

    /// Number of distinct modifiers a stability update can hide.
    #[must_use]
    pub const fn modifier_count(&self) -> u32 {
        self.team_size as u32 + 2
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::new(MIN_TEAM_SIZE)
    }
}

/// Inclusive bounds on the next true stability delta implied by an estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeltaBounds {
    low: i32,
    high: i32,
}

impl DeltaBounds {
    /// Creates delta bounds from two endpoints, ordering them.
    #[must_use]
    pub const fn new(a: i32, b: i32) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Most negative delta still considered possible.
    #[must_use]
    pub const fn low(&self) -> i32 {
        self.low
    }

    /// Most positive delta still considered possible.
    #[must_use]
    pub const fn high(&self) -> i32 {
        self.high
    }

    /// Whether the provided delta falls inside the bounds.
    #[must_use]
    pub const fn contains(&self, delta: i32) -> bool {
        self.low <= delta && delta <= self.high
    }
}

/// Operator-facing rendering of a single vent estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VentEstimate {
    /// Nothing is known beyond the value domain itself.
    Unknown,
    /// The exact value is known.
    Exact {
        /// The pinned value.
        value: u8,
        /// Whether freeze-band reasoning pinned the value instead of a reveal.
        via_freeze_clip: bool,
    },
    /// A single contiguous candidate range.
    Range {
        /// The merged candidate range.
        span: Interval,
    },
    /// Two disjoint candidate ranges mirrored around the midpoint.
    SplitRange {
        /// Candidate range below the midpoint.
        lower: Interval,
        /// Candidate range above the midpoint.
        upper: Interval,
    },
}

/// Per-vent slice of the display payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VentDisplay {
    /// Vent the payload describes.
    pub vent: VentId,
    /// Direction currently on record for the vent.
    pub direction: MoveDirection,
    /// Candidate estimate for the vent's hidden value.
    pub estimate: VentEstimate,
}

/// Complete estimate payload handed to presentation layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayState {
    /// Tick the payload describes.
    pub tick: GameTick,
    /// Per-vent estimates in canonical vent order.
    pub vents: [VentDisplay; 3],
    /// Bounds on the next true stability delta, when derivable.
    pub predicted_delta: Option<DeltaBounds>,
}

const fn clamp_to_domain(raw: i32) -> u8 {
    if raw < MIN_VENT_VALUE as i32 {
        MIN_VENT_VALUE
    } else if raw > MAX_VENT_VALUE as i32 {
        MAX_VENT_VALUE
    } else {
        raw as u8
    }
}

#[cfg(test)]
mod tests {
    use super::{
        freeze_band, in_freeze_band, stability_delta, stability_score, DirectionMask,
        InferenceConfig, Interval, MoveDirection, StepPattern, VentId, VentReading,
        MAX_STABILITY_DELTA, MIN_STABILITY_DELTA,
    };
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn interval_constructor_orders_and_clamps() {
        let interval = Interval::new(80, 30);
        assert_eq!(interval.start(), 30);
        assert_eq!(interval.end(), 80);

        let clamped = Interval::new(90, 250);
        assert_eq!(clamped.start(), 90);
        assert_eq!(clamped.end(), 100);
    }

    #[test]
    fn interval_subtract_splits_around_hole() {
        let interval = Interval::new(30, 70);
        let (left, right) = interval.subtract(freeze_band());
        assert_eq!(left, Some(Interval::new(30, 40)));
        assert_eq!(right, Some(Interval::new(60, 70)));
    }

    #[test]
    fn interval_subtract_handles_domain_edges() {
        let all = Interval::full();
        let (left, right) = all.subtract(Interval::new(0, 40));
        assert_eq!(left, None);
        assert_eq!(right, Some(Interval::new(41, 100)));

        let (left, right) = all.subtract(Interval::new(60, 100));
        assert_eq!(left, Some(Interval::new(0, 59)));
        assert_eq!(right, None);
    }

    #[test]
    fn interval_touch_detection_includes_adjacency() {
        let lower = Interval::new(47, 50);
        let upper = Interval::new(51, 53);
        assert!(!lower.overlaps(upper));
        assert!(lower.touches_or_overlaps(upper));
        assert!(!lower.touches_or_overlaps(Interval::new(52, 53)));
    }

    #[test]
    fn interval_mirror_reflects_around_midpoint() {
        assert_eq!(Interval::new(47, 50).mirrored(), Interval::new(50, 53));
        assert_eq!(Interval::new(0, 100).mirrored(), Interval::new(0, 100));
    }

    #[test]
    fn interval_shift_clamps_to_domain() {
        let interval = Interval::new(1, 99);
        let shifted = interval.shift_edges(-4, 4);
        assert_eq!(shifted, Interval::new(0, 100));
    }

    #[test]
    fn stability_score_peaks_at_midpoint() {
        assert_eq!(stability_score(50), 50);
        assert_eq!(stability_score(0), 0);
        assert_eq!(stability_score(100), 0);
        assert_eq!(stability_score(41), 41);
        assert_eq!(stability_score(59), 41);
    }

    #[test]
    fn stability_delta_spans_documented_bounds() {
        assert_eq!(stability_delta([50, 50, 50]), MAX_STABILITY_DELTA);
        assert_eq!(stability_delta([0, 0, 0]), MIN_STABILITY_DELTA);
        assert_eq!(stability_delta([100, 100, 100]), MIN_STABILITY_DELTA);
    }

    #[test]
    fn stability_delta_floors_the_average() {
        // Scores 50 + 49 + 49 = 148, floored third is 49.
        assert_eq!(stability_delta([50, 49, 51]), 24);
    }

    #[test]
    fn freeze_band_boundaries_are_inclusive() {
        assert!(!in_freeze_band(40));
        assert!(in_freeze_band(41));
        assert!(in_freeze_band(59));
        assert!(!in_freeze_band(60));
    }

    #[test]
    fn direction_mask_reports_per_vent_directions() {
        let mask = DirectionMask::from_bits(0b101);
        assert_eq!(mask.direction_of(VentId::A), MoveDirection::Up);
        assert_eq!(mask.direction_of(VentId::B), MoveDirection::Down);
        assert_eq!(mask.direction_of(VentId::C), MoveDirection::Up);

        let flipped = mask.with_downward(VentId::A).with_upward(VentId::B);
        assert_eq!(flipped.bits(), 0b110);
    }

    #[test]
    fn direction_mask_ignores_high_bits() {
        assert_eq!(DirectionMask::from_bits(0xFF).bits(), 0b111);
    }

    #[test]
    fn step_pattern_records_per_vent_magnitudes() {
        let pattern = StepPattern::empty()
            .with_step(VentId::A, 2)
            .with_step(VentId::C, 0);
        assert_eq!(pattern.step_of(VentId::A), Some(2));
        assert_eq!(pattern.step_of(VentId::B), None);
        assert_eq!(pattern.step_of(VentId::C), Some(0));
        assert_eq!(pattern.observed_count(), 2);
        assert!(!pattern.is_empty());
    }

    #[test]
    fn influencer_topology_matches_vent_ordering() {
        assert!(VentId::A.influencers().is_empty());
        assert_eq!(VentId::B.influencers(), &[VentId::A]);
        assert_eq!(VentId::C.influencers(), &[VentId::A, VentId::B]);
    }

    #[test]
    fn config_clamps_team_size_and_derives_modifiers() {
        let solo = InferenceConfig::new(1);
        assert_eq!(solo.modifier_low(), -2);
        assert_eq!(solo.modifier_high(), 0);
        assert_eq!(solo.modifier_count(), 3);

        let oversized = InferenceConfig::new(9);
        assert_eq!(oversized.team_size(), 5);
        assert_eq!(oversized.modifier_low(), -6);
        assert_eq!(oversized.modifier_count(), 7);

        let undersized = InferenceConfig::new(0);
        assert_eq!(undersized.team_size(), 1);
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn vent_reading_round_trips_through_bincode() {
        assert_round_trip(&VentReading::Hidden);
        assert_round_trip(&VentReading::Visible(73));
    }

    #[test]
    fn direction_mask_round_trips_through_bincode() {
        assert_round_trip(&DirectionMask::from_bits(0b011));
    }
}
