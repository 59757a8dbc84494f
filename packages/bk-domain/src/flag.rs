use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

pub type FlagId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Data pass and simulation pass are mutually exclusive.")]
pub struct ExclusivePassError;

/// Which production a flag qualifies: a data pass, a simulation pass, or synchronous (online) QC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PassContext {
	DataPass(i64),
	SimulationPass(i64),
	Synchronous,
}
impl PassContext {
	pub fn from_options(
		data_pass_id: Option<i64>,
		simulation_pass_id: Option<i64>,
	) -> Result<Self, ExclusivePassError> {
		match (data_pass_id, simulation_pass_id) {
			(Some(_), Some(_)) => Err(ExclusivePassError),
			(Some(id), None) => Ok(Self::DataPass(id)),
			(None, Some(id)) => Ok(Self::SimulationPass(id)),
			(None, None) => Ok(Self::Synchronous),
		}
	}

	pub fn data_pass_id(self) -> Option<i64> {
		match self {
			Self::DataPass(id) => Some(id),
			_ => None,
		}
	}

	pub fn simulation_pass_id(self) -> Option<i64> {
		match self {
			Self::SimulationPass(id) => Some(id),
			_ => None,
		}
	}
}
impl Display for PassContext {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		match self {
			Self::DataPass(id) => write!(f, "data-pass:{id}"),
			Self::SimulationPass(id) => write!(f, "simulation-pass:{id}"),
			Self::Synchronous => f.write_str("synchronous"),
		}
	}
}

/// The `(run, detector, pass)` triple that bounds every effective-period computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
	pub run_number: i64,
	pub detector_id: i64,
	pub pass: PassContext,
}
impl Scope {
	pub fn new(run_number: i64, detector_id: i64, pass: PassContext) -> Self {
		Self { run_number, detector_id, pass }
	}

	/// Stable byte string identifying the scope, used to derive its lock key.
	pub fn lock_material(&self) -> String {
		format!("qc-scope:{self}")
	}
}
impl Display for Scope {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "{}:{}:{}", self.run_number, self.detector_id, self.pass)
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagType {
	pub bad: bool,
	pub mc_reproducible: bool,
}

/// What the aggregators need to know about a flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRef {
	pub flag_id: FlagId,
	pub detector_id: i64,
	pub flag_type: FlagType,
	pub verified: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorRef {
	pub detector_id: i64,
	pub name: String,
}
