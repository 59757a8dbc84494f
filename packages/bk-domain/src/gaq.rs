//! Global aggregated quality: merges the effective periods of several detectors into one
//! partition of the run's QC window.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
	flag::FlagRef,
	interval::{Interval, RunWindow},
};

/// One flag together with its effective periods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GaqInput {
	pub flag: FlagRef,
	pub periods: Vec<Interval>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePeriod {
	#[serde(flatten)]
	pub interval: Interval,
	pub contributing_flags: Vec<FlagRef>,
}
impl TimelinePeriod {
	pub fn is_undefined_quality(&self) -> bool {
		self.contributing_flags.is_empty()
	}
}

/// Builds the elementary timeline of a run.
///
/// Every period is clipped to the QC window; open period bounds resolve to the window bounds when
/// those are known and stay open otherwise. Consecutive boundary points delimit the elementary
/// intervals, and each lists every flag whose effective periods cover it, ordered by flag id.
/// Intervals no flag covers are kept with an empty contributor list.
pub fn build_timeline(window: &RunWindow, inputs: &[GaqInput]) -> Vec<TimelinePeriod> {
	let run = window.as_interval();
	let clipped: Vec<(&FlagRef, Vec<Interval>)> = inputs
		.iter()
		.map(|input| {
			(&input.flag, input.periods.iter().filter_map(|period| period.intersect(&run)).collect())
		})
		.collect();
	let mut points = BTreeSet::from([window.start(), window.end()]);

	for (_, periods) in &clipped {
		for period in periods {
			points.insert(period.start());
			points.insert(period.end());
		}
	}

	let points: Vec<_> = points.into_iter().collect();

	points
		.windows(2)
		.map(|pair| Interval::from_points(pair[0], pair[1]))
		.filter(|elementary| run.covers(elementary))
		.map(|elementary| {
			let mut contributing_flags: Vec<FlagRef> = clipped
				.iter()
				.filter(|(_, periods)| periods.iter().any(|period| period.covers(&elementary)))
				.map(|(flag, _)| (*flag).clone())
				.collect();

			contributing_flags.sort_by_key(|flag| flag.flag_id);
			contributing_flags.dedup_by_key(|flag| flag.flag_id);

			TimelinePeriod { interval: elementary, contributing_flags }
		})
		.collect()
}
