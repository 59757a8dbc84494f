//! Half-open time intervals whose endpoints may be left open at the run boundaries.
//!
//! An open `from` means "since the run started" and an open `to` means "until the run ended".
//! Comparisons are carried out on [`Point`], which places an open `from` before every instant and
//! an open `to` after every instant, so no sentinel timestamp is ever substituted for an open end.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Duration, OffsetDateTime, serde::rfc3339};

/// One endpoint of an interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bound {
	Unbounded,
	At(OffsetDateTime),
}
impl Bound {
	pub fn as_option(self) -> Option<OffsetDateTime> {
		match self {
			Self::Unbounded => None,
			Self::At(at) => Some(at),
		}
	}

	pub fn is_unbounded(self) -> bool {
		matches!(self, Self::Unbounded)
	}
}
impl From<Option<OffsetDateTime>> for Bound {
	fn from(value: Option<OffsetDateTime>) -> Self {
		value.map_or(Self::Unbounded, Self::At)
	}
}
impl Serialize for Bound {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		rfc3339::option::serialize(&self.as_option(), serializer)
	}
}
impl<'de> Deserialize<'de> for Bound {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		rfc3339::option::deserialize(deserializer).map(Self::from)
	}
}

/// Position on the run's time axis. Variant order gives the total order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Point {
	NegInf,
	At(OffsetDateTime),
	PosInf,
}
impl Point {
	fn start_bound(self) -> Bound {
		match self {
			Self::At(at) => Bound::At(at),
			Self::NegInf | Self::PosInf => Bound::Unbounded,
		}
	}

	fn end_bound(self) -> Bound {
		self.start_bound()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IntervalRejection {
	#[error("Interval end must be later than its start.")]
	Inverted,
	#[error("Interval starts before the run's QC window.")]
	BeforeRunStart,
	#[error("Interval ends after the run's QC window.")]
	AfterRunEnd,
	#[error("Interval has a concrete bound while the matching run boundary is unknown.")]
	UnresolvableBound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
	pub from: Bound,
	pub to: Bound,
}
impl Interval {
	pub const WHOLE_RUN: Self = Self { from: Bound::Unbounded, to: Bound::Unbounded };

	pub fn new(from: Bound, to: Bound) -> Result<Self, IntervalRejection> {
		let interval = Self { from, to };

		if interval.start() >= interval.end() {
			return Err(IntervalRejection::Inverted);
		}

		Ok(interval)
	}

	pub fn between(from: OffsetDateTime, to: OffsetDateTime) -> Result<Self, IntervalRejection> {
		Self::new(Bound::At(from), Bound::At(to))
	}

	pub fn is_whole_run(&self) -> bool {
		self.from.is_unbounded() && self.to.is_unbounded()
	}

	pub fn intersect(&self, other: &Self) -> Option<Self> {
		let start = self.start().max(other.start());
		let end = self.end().min(other.end());

		(start < end).then(|| Self::from_points(start, end))
	}

	pub fn overlaps(&self, other: &Self) -> bool {
		self.intersect(other).is_some()
	}

	/// True when `inner` lies entirely inside `self`.
	pub fn covers(&self, inner: &Self) -> bool {
		self.start() <= inner.start() && inner.end() <= self.end()
	}

	/// Removes `other` from `self`, yielding zero, one, or two pieces in time order.
	pub fn subtract(&self, other: &Self) -> Vec<Self> {
		if !self.overlaps(other) {
			return vec![*self];
		}

		let mut pieces = Vec::with_capacity(2);

		if self.start() < other.start() {
			pieces.push(Self::from_points(self.start(), other.start()));
		}
		if other.end() < self.end() {
			pieces.push(Self::from_points(other.end(), self.end()));
		}

		pieces
	}

	/// Removes every interval of `others` from `self`.
	pub fn subtract_all(&self, others: &[Self]) -> Vec<Self> {
		let mut pieces = vec![*self];

		for other in others {
			if pieces.is_empty() {
				break;
			}

			pieces = pieces.iter().flat_map(|piece| piece.subtract(other)).collect();
		}

		pieces
	}

	/// Duration of the part of `self` inside `window`, or `None` when an open bound meets an
	/// unknown run boundary.
	pub fn duration_within(&self, window: &RunWindow) -> Option<Duration> {
		let start = match (self.from, window.from) {
			(Bound::Unbounded, from) => from?,
			(Bound::At(at), Some(from)) => at.max(from),
			(Bound::At(at), None) => at,
		};
		let end = match (self.to, window.to) {
			(Bound::Unbounded, to) => to?,
			(Bound::At(at), Some(to)) => at.min(to),
			(Bound::At(at), None) => at,
		};

		Some(if end > start { end - start } else { Duration::ZERO })
	}

	/// Checks a declared interval against the run's QC window.
	pub fn check_against_window(&self, window: &RunWindow) -> Result<(), IntervalRejection> {
		if self.start() >= self.end() {
			return Err(IntervalRejection::Inverted);
		}
		if self.is_whole_run() {
			return Ok(());
		}

		let from = self.from.as_option().or(window.from);
		let to = self.to.as_option().or(window.to);
		let (Some(from), Some(to)) = (from, to) else {
			return Err(IntervalRejection::UnresolvableBound);
		};

		if from >= to {
			return Err(IntervalRejection::Inverted);
		}
		if let Some(run_start) = window.from
			&& from < run_start
		{
			return Err(IntervalRejection::BeforeRunStart);
		}
		if let Some(run_end) = window.to
			&& to > run_end
		{
			return Err(IntervalRejection::AfterRunEnd);
		}

		Ok(())
	}

	/// Replaces bounds that coincide with the run's QC window by open bounds.
	pub fn normalize_to_window(&self, window: &RunWindow) -> Self {
		let from = match (self.from, window.from) {
			(Bound::At(at), Some(run_start)) if at == run_start => Bound::Unbounded,
			(from, _) => from,
		};
		let to = match (self.to, window.to) {
			(Bound::At(at), Some(run_end)) if at == run_end => Bound::Unbounded,
			(to, _) => to,
		};

		Self { from, to }
	}

	pub(crate) fn start(&self) -> Point {
		match self.from {
			Bound::Unbounded => Point::NegInf,
			Bound::At(at) => Point::At(at),
		}
	}

	pub(crate) fn end(&self) -> Point {
		match self.to {
			Bound::Unbounded => Point::PosInf,
			Bound::At(at) => Point::At(at),
		}
	}

	pub(crate) fn from_points(start: Point, end: Point) -> Self {
		debug_assert!(start < end, "interval points must be ordered");
		debug_assert!(start != Point::PosInf && end != Point::NegInf);

		Self { from: start.start_bound(), to: end.end_bound() }
	}
}
impl Ord for Interval {
	fn cmp(&self, other: &Self) -> Ordering {
		self.start().cmp(&other.start()).then_with(|| self.end().cmp(&other.end()))
	}
}
impl PartialOrd for Interval {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// The run's QC time window. Either side may still be unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWindow {
	#[serde(with = "rfc3339::option")]
	pub from: Option<OffsetDateTime>,
	#[serde(with = "rfc3339::option")]
	pub to: Option<OffsetDateTime>,
}
impl RunWindow {
	pub fn new(from: Option<OffsetDateTime>, to: Option<OffsetDateTime>) -> Self {
		Self { from, to }
	}

	pub fn is_determined(&self) -> bool {
		self.from.is_some() && self.to.is_some()
	}

	/// Positive duration of a fully known window.
	pub fn duration(&self) -> Option<Duration> {
		match (self.from, self.to) {
			(Some(from), Some(to)) if to > from => Some(to - from),
			_ => None,
		}
	}

	pub fn as_interval(&self) -> Interval {
		Interval { from: self.from.into(), to: self.to.into() }
	}

	pub(crate) fn start(&self) -> Point {
		self.from.map_or(Point::NegInf, Point::At)
	}

	pub(crate) fn end(&self) -> Point {
		self.to.map_or(Point::PosInf, Point::At)
	}
}

/// Merges overlapping or adjacent intervals into a minimal, time-ordered disjoint set.
pub fn union_all<I>(intervals: I) -> Vec<Interval>
where
	I: IntoIterator<Item = Interval>,
{
	let mut sorted: Vec<Interval> = intervals.into_iter().collect();

	sorted.sort();

	let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());

	for interval in sorted {
		match merged.last_mut() {
			Some(last) if interval.start() <= last.end() => {
				if interval.end() > last.end() {
					last.to = interval.to;
				}
			},
			_ => merged.push(interval),
		}
	}

	merged
}
