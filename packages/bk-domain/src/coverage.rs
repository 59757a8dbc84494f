use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
	flag::FlagRef,
	gaq::TimelinePeriod,
	interval::{Interval, RunWindow},
};

/// Quality of one elementary interval, derived from its contributing flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
	Bad,
	McReproducible,
	NotBad,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageOptions {
	#[serde(default)]
	pub mc_reproducible_as_not_bad: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
	pub bad_coverage: Option<f64>,
	pub not_bad_coverage: Option<f64>,
	pub mc_reproducible: bool,
	pub missing_verifications_count: usize,
	pub undefined_quality_periods_count: usize,
}

/// `None` when no flag contributes.
pub fn block_significance(flags: &[FlagRef]) -> Option<Significance> {
	if flags.is_empty() {
		return None;
	}
	if flags.iter().any(|flag| flag.flag_type.bad && !flag.flag_type.mc_reproducible) {
		return Some(Significance::Bad);
	}
	if flags.iter().any(|flag| flag.flag_type.mc_reproducible) {
		return Some(Significance::McReproducible);
	}

	Some(Significance::NotBad)
}

#[derive(Debug)]
struct Bucket {
	total: Duration,
	empty: bool,
	indeterminate: bool,
	spans_window: bool,
}
impl Bucket {
	fn new() -> Self {
		Self { total: Duration::ZERO, empty: true, indeterminate: false, spans_window: true }
	}

	fn add(&mut self, interval: &Interval, window: &RunWindow) {
		self.empty = false;
		self.spans_window &= *interval == window.as_interval();

		match interval.duration_within(window) {
			Some(duration) => self.total += duration,
			None => self.indeterminate = true,
		}
	}

	fn fraction(&self, window: &RunWindow) -> Option<f64> {
		if self.empty {
			return Some(0.0);
		}

		match window.duration() {
			Some(run) if !self.indeterminate =>
				Some((self.total.as_seconds_f64() / run.as_seconds_f64()).clamp(0.0, 1.0)),
			_ if !window.is_determined() && self.spans_window => Some(1.0),
			_ => None,
		}
	}
}

/// Reduces a timeline to coverage fractions of the run's QC window.
pub fn summarize(
	timeline: &[TimelinePeriod],
	window: &RunWindow,
	options: CoverageOptions,
) -> CoverageSummary {
	let mut bad = Bucket::new();
	let mut not_bad = Bucket::new();
	let mut mc_reproducible = false;
	let mut undefined_quality_periods_count = 0;
	let mut unverified = BTreeSet::new();

	for period in timeline {
		let Some(significance) = block_significance(&period.contributing_flags) else {
			undefined_quality_periods_count += 1;

			continue;
		};

		unverified.extend(
			period.contributing_flags.iter().filter(|flag| !flag.verified).map(|flag| flag.flag_id),
		);

		let bucket = match significance {
			Significance::Bad => &mut bad,
			Significance::McReproducible => {
				mc_reproducible = true;

				if options.mc_reproducible_as_not_bad { &mut not_bad } else { &mut bad }
			},
			Significance::NotBad => &mut not_bad,
		};

		bucket.add(&period.interval, window);
	}

	CoverageSummary {
		bad_coverage: bad.fraction(window),
		not_bad_coverage: not_bad.fraction(window),
		mc_reproducible,
		missing_verifications_count: unverified.len(),
		undefined_quality_periods_count,
	}
}
