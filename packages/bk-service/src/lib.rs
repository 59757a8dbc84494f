pub mod create;
pub mod delete;
pub mod effective;
pub mod gaq;
pub mod recompute;
pub mod summary;
pub mod verify;

mod error;
mod scope;

pub use bk_domain::{
	access::{Actor, UserIdentifier},
	coverage::{CoverageOptions, CoverageSummary},
	flag::{PassContext, Scope},
	gaq::TimelinePeriod as GaqPeriod,
	interval::{Bound, Interval},
};
pub use create::{CreateFlagsRequest, CreatedFlag, FlagSpec};
pub use delete::{DeleteAllForDataPassRequest, DeleteAllForDataPassResponse, DeleteRequest, DeleteResponse};
pub use error::{Error, Result};
pub use gaq::{GaqDetectorEntry, SetGaqDetectorsRequest};
pub use recompute::{RecomputeReport, ScopeViolation};
pub use summary::{CoverageTarget, PassSummaryRequest};
pub use verify::{VerifyRequest, VerifyResponse};

use bk_config::Config;
use bk_storage::db::Db;

/// Entry point for every QC flag operation. Writes are serialized per scope; reads run on
/// read-only snapshots.
pub struct QcService {
	pub cfg: Config,
	pub db: Db,
}
impl QcService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db }
	}
}
