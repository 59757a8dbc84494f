//! Effective periods: the parts of each flag's declared interval where it is the most recently
//! created non-deleted flag of its scope.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	flag::FlagId,
	interval::{self, Interval},
};

/// A flag of one scope as loaded for recomputation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopedFlag {
	pub flag_id: FlagId,
	pub created_at: OffsetDateTime,
	pub declared: Interval,
	pub deleted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EffectivePeriod {
	pub flag_id: FlagId,
	pub interval: Interval,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
	#[error("Effective periods of flags {first} and {second} overlap.")]
	Overlap { first: FlagId, second: FlagId },
	#[error("Effective period of flag {flag_id} lies outside its declared interval.")]
	OutsideDeclared { flag_id: FlagId },
	#[error("Effective period references flag {flag_id}, which is missing or deleted.")]
	Orphan { flag_id: FlagId },
	#[error("Union of effective periods differs from union of declared intervals.")]
	CoverageMismatch,
	#[error("Effective periods of flag {flag_id} do not match a fresh recomputation.")]
	Stale { flag_id: FlagId },
}

/// Recomputes every effective period of a scope from its flags.
///
/// Flags are visited newest first (creation time, then id). Each one keeps what remains of its
/// declared interval after removing everything claimed by newer flags. Deleted flags take no
/// part. The result is ordered by flag id, then by time.
pub fn recompute(flags: &[ScopedFlag]) -> Vec<EffectivePeriod> {
	let mut live: Vec<&ScopedFlag> = flags.iter().filter(|flag| !flag.deleted).collect();

	live.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.flag_id.cmp(&a.flag_id)));

	let mut claimed: Vec<Interval> = Vec::new();
	let mut periods = Vec::new();

	for flag in live {
		periods.extend(
			flag.declared
				.subtract_all(&claimed)
				.into_iter()
				.map(|interval| EffectivePeriod { flag_id: flag.flag_id, interval }),
		);

		claimed.push(flag.declared);
		claimed = interval::union_all(claimed);
	}

	periods.sort();

	periods
}

/// Verifies the stored periods of a scope against its flags and reports the first violation.
pub fn check_scope_invariants(
	flags: &[ScopedFlag],
	periods: &[EffectivePeriod],
) -> Result<(), InvariantViolation> {
	let declared: BTreeMap<FlagId, Interval> = flags
		.iter()
		.filter(|flag| !flag.deleted)
		.map(|flag| (flag.flag_id, flag.declared))
		.collect();

	for period in periods {
		let Some(flag_declared) = declared.get(&period.flag_id) else {
			return Err(InvariantViolation::Orphan { flag_id: period.flag_id });
		};

		if !flag_declared.covers(&period.interval) {
			return Err(InvariantViolation::OutsideDeclared { flag_id: period.flag_id });
		}
	}

	let mut by_time: Vec<&EffectivePeriod> = periods.iter().collect();

	by_time.sort_by(|a, b| a.interval.cmp(&b.interval).then_with(|| a.flag_id.cmp(&b.flag_id)));

	let mut furthest: Option<&EffectivePeriod> = None;

	for period in by_time {
		if let Some(previous) = furthest
			&& period.interval.start() < previous.interval.end()
		{
			return Err(InvariantViolation::Overlap {
				first: previous.flag_id.min(period.flag_id),
				second: previous.flag_id.max(period.flag_id),
			});
		}

		// Sorted by start and disjoint so far, so this period now reaches furthest.
		furthest = Some(period);
	}

	if interval::union_all(periods.iter().map(|period| period.interval))
		!= interval::union_all(declared.values().copied())
	{
		return Err(InvariantViolation::CoverageMismatch);
	}

	let expected: BTreeSet<EffectivePeriod> = recompute(flags).into_iter().collect();
	let actual: BTreeSet<EffectivePeriod> = periods.iter().copied().collect();

	if let Some(diff) = expected.symmetric_difference(&actual).next() {
		return Err(InvariantViolation::Stale { flag_id: diff.flag_id });
	}

	Ok(())
}

/// Effective periods of one flag, in time order.
pub fn periods_of(periods: &[EffectivePeriod], flag_id: FlagId) -> Vec<Interval> {
	let mut intervals: Vec<Interval> =
		periods.iter().filter(|period| period.flag_id == flag_id).map(|p| p.interval).collect();

	intervals.sort();

	intervals
}
