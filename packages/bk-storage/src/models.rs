use time::OffsetDateTime;

use bk_domain::{
	flag::{PassContext, Scope},
	interval::{Bound, Interval},
};

#[derive(Debug, sqlx::FromRow)]
pub struct User {
	pub id: i64,
	pub external_id: i64,
	pub name: String,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Detector {
	pub id: i64,
	pub name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Run {
	pub run_number: i64,
	pub qc_time_start: Option<OffsetDateTime>,
	pub qc_time_end: Option<OffsetDateTime>,
	pub pdp_beam_type: Option<String>,
	pub lhc_period_id: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DataPass {
	pub id: i64,
	pub name: String,
	pub frozen: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct QcFlagType {
	pub id: i64,
	pub name: String,
	pub method: String,
	pub bad: bool,
	pub mc_reproducible: bool,
	pub archived: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct QcFlag {
	pub id: i64,
	pub run_number: i64,
	pub detector_id: i64,
	pub data_pass_id: Option<i64>,
	pub simulation_pass_id: Option<i64>,
	pub flag_type_id: i64,
	pub from_ts: Option<OffsetDateTime>,
	pub to_ts: Option<OffsetDateTime>,
	pub comment: Option<String>,
	pub deleted: bool,
	pub created_by: i64,
	pub created_at: OffsetDateTime,
}
impl QcFlag {
	pub fn declared(&self) -> Interval {
		Interval { from: Bound::from(self.from_ts), to: Bound::from(self.to_ts) }
	}

	/// Rows are constrained to at most one pass column.
	pub fn pass(&self) -> PassContext {
		match (self.data_pass_id, self.simulation_pass_id) {
			(Some(id), _) => PassContext::DataPass(id),
			(None, Some(id)) => PassContext::SimulationPass(id),
			(None, None) => PassContext::Synchronous,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct EffectivePeriod {
	pub flag_id: i64,
	pub from_ts: Option<OffsetDateTime>,
	pub to_ts: Option<OffsetDateTime>,
}
impl EffectivePeriod {
	pub fn interval(&self) -> Interval {
		Interval { from: Bound::from(self.from_ts), to: Bound::from(self.to_ts) }
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct Verification {
	pub id: i64,
	pub flag_id: i64,
	pub comment: Option<String>,
	pub created_by: i64,
	pub created_at: OffsetDateTime,
}

/// One effective period joined with what aggregation needs from its flag.
#[derive(Debug, sqlx::FromRow)]
pub struct FlagPeriod {
	pub flag_id: i64,
	pub detector_id: i64,
	pub bad: bool,
	pub mc_reproducible: bool,
	pub verified: bool,
	pub from_ts: Option<OffsetDateTime>,
	pub to_ts: Option<OffsetDateTime>,
}
impl FlagPeriod {
	pub fn interval(&self) -> Interval {
		Interval { from: Bound::from(self.from_ts), to: Bound::from(self.to_ts) }
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct ScopeKey {
	pub run_number: i64,
	pub detector_id: i64,
	pub data_pass_id: Option<i64>,
	pub simulation_pass_id: Option<i64>,
}
impl ScopeKey {
	pub fn scope(&self) -> Scope {
		let pass = match (self.data_pass_id, self.simulation_pass_id) {
			(Some(id), _) => PassContext::DataPass(id),
			(None, Some(id)) => PassContext::SimulationPass(id),
			(None, None) => PassContext::Synchronous,
		};

		Scope::new(self.run_number, self.detector_id, pass)
	}
}
