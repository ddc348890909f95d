use std::ops::Range;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ConfigurationError;

use super::TimeStep;

/// Linear, sorted, non-touching ranges inside `[0, horizon)`.
///
/// Two arcs on a circle intersect in at most two arcs, one of which may cross the
/// origin, so three linear ranges always fit inline.
pub type LinearRanges = SmallVec<[Range<TimeStep>; 3]>;

/// A half-open interval `[start, start + length)` on the circle `[0, horizon)`.
///
/// The horizon is not stored: every operation takes it and checks
/// `0 <= start < horizon` and `0 <= length <= horizon` first. A zero-length
/// interval contains no point and intersects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CyclicInterval {
    start: TimeStep,
    length: TimeStep,
}

impl CyclicInterval {
    pub const fn new(start: TimeStep, length: TimeStep) -> Self {
        CyclicInterval { start, length }
    }

    /// Builds an interval and checks it against `horizon` right away.
    pub fn checked(
        start: TimeStep,
        length: TimeStep,
        horizon: TimeStep,
    ) -> Result<Self, ConfigurationError> {
        let interval = CyclicInterval::new(start, length);
        interval.check(horizon)?;
        Ok(interval)
    }

    pub fn start(&self) -> TimeStep {
        self.start
    }

    pub fn length(&self) -> TimeStep {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn check(&self, horizon: TimeStep) -> Result<(), ConfigurationError> {
        if horizon <= 0 {
            return Err(ConfigurationError::NonPositiveHorizon { horizon });
        }

        if self.start < 0 || self.start >= horizon {
            return Err(ConfigurationError::IntervalStartOutOfRange {
                start: self.start,
                horizon,
            });
        }

        if self.length < 0 || self.length > horizon {
            return Err(ConfigurationError::IntervalLengthOutOfRange {
                length: self.length,
                horizon,
            });
        }

        Ok(())
    }

    /// Cyclic forward distance from `start` to `time`, in `[0, horizon)`.
    pub fn shifts_from_start(
        &self,
        time: TimeStep,
        horizon: TimeStep,
    ) -> Result<TimeStep, ConfigurationError> {
        self.check(horizon)?;
        Ok(self.offset_of(time, horizon))
    }

    pub fn contains(&self, time: TimeStep, horizon: TimeStep) -> Result<bool, ConfigurationError> {
        self.check(horizon)?;
        Ok(self.offset_of(time, horizon) < self.length)
    }

    pub fn shift(&self, delta: TimeStep, horizon: TimeStep) -> Result<Self, ConfigurationError> {
        self.check(horizon)?;
        Ok(CyclicInterval {
            start: (self.start + delta).rem_euclid(horizon),
            length: self.length,
        })
    }

    /// Two non-empty arcs meet iff one of them contains the start of the other.
    pub fn is_intersecting(
        &self,
        other: &CyclicInterval,
        horizon: TimeStep,
    ) -> Result<bool, ConfigurationError> {
        self.check(horizon)?;
        other.check(horizon)?;

        if self.is_empty() || other.is_empty() {
            return Ok(false);
        }

        Ok(self.offset_of(other.start, horizon) < self.length
            || other.offset_of(self.start, horizon) < other.length)
    }

    /// Points shared by both intervals as sorted linear ranges.
    ///
    /// With `left` the interval that starts first, the result is the part of `right`
    /// that lies under `left` (measured in unwrapped coordinates), plus the part of
    /// `left` covered by the tail of `right` that wraps past the horizon.
    pub fn intersection(
        &self,
        other: &CyclicInterval,
        horizon: TimeStep,
    ) -> Result<LinearRanges, ConfigurationError> {
        self.check(horizon)?;
        other.check(horizon)?;

        let (left, right) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        let left_end = left.start + left.length;
        let right_end = right.start + right.length;

        let mut ranges = LinearRanges::new();

        let head = right.length.min(left_end - right.start);
        if head > 0 {
            push_wrapped(&mut ranges, right.start, head, horizon);
        }

        let tail = left.length.min(right_end - horizon - left.start);
        if tail > 0 {
            push_wrapped(&mut ranges, left.start, tail, horizon);
        }

        Ok(normalize(ranges))
    }

    pub fn linear_ranges(&self, horizon: TimeStep) -> Result<LinearRanges, ConfigurationError> {
        self.check(horizon)?;
        let mut ranges = LinearRanges::new();
        push_wrapped(&mut ranges, self.start, self.length, horizon);
        Ok(ranges)
    }

    /// Every time step of the interval, starting at `start` and wrapping once.
    pub fn iter_points(
        &self,
        horizon: TimeStep,
    ) -> Result<impl Iterator<Item = TimeStep> + Clone + use<>, ConfigurationError> {
        let ranges = self.linear_ranges(horizon)?;
        Ok(ranges.into_iter().flatten())
    }

    fn offset_of(&self, time: TimeStep, horizon: TimeStep) -> TimeStep {
        let time = time.rem_euclid(horizon);
        if time >= self.start {
            time - self.start
        } else {
            horizon + time - self.start
        }
    }
}

impl std::fmt::Display for CyclicInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, +{})", self.start, self.length)
    }
}

fn push_wrapped(ranges: &mut LinearRanges, start: TimeStep, length: TimeStep, horizon: TimeStep) {
    if length <= 0 {
        return;
    }

    let end = start + length;
    if end <= horizon {
        ranges.push(start..end);
    } else {
        ranges.push(start..horizon);
        ranges.push(0..end - horizon);
    }
}

fn normalize(mut ranges: LinearRanges) -> LinearRanges {
    ranges.sort_by_key(|range| range.start);

    let mut merged = LinearRanges::new();
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.end >= range.start => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }

    merged
}

/// Total number of time steps covered by `ranges`.
pub fn point_count(ranges: &[Range<TimeStep>]) -> TimeStep {
    ranges.iter().map(|range| range.end - range.start).sum()
}
