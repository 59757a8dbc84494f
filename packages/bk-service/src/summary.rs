use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use bk_domain::{
	coverage::{self, CoverageOptions, CoverageSummary},
	flag::{PassContext, Scope},
	gaq,
	interval::RunWindow,
};
use bk_storage::queries;

use crate::{Error, QcService, Result, gaq::group_flag_periods, scope};

/// What a coverage summary is computed over.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageTarget {
	/// One detector's flags of a run in a pass.
	Scope {
		run_number: i64,
		detector_id: i64,
		#[serde(default)]
		data_pass_id: Option<i64>,
		#[serde(default)]
		simulation_pass_id: Option<i64>,
	},
	/// Global aggregated quality of a run in a data pass.
	Gaq { data_pass_id: i64, run_number: i64 },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PassSummaryRequest {
	#[serde(default)]
	pub data_pass_id: Option<i64>,
	#[serde(default)]
	pub simulation_pass_id: Option<i64>,
	/// Restricts a synchronous summary to runs of one LHC period.
	#[serde(default)]
	pub lhc_period_id: Option<i64>,
	#[serde(default)]
	pub options: CoverageOptions,
}

impl QcService {
	pub async fn coverage_summary(
		&self,
		target: CoverageTarget,
		options: CoverageOptions,
	) -> Result<CoverageSummary> {
		let mut tx = self.db.begin_snapshot().await?;
		let summary = match target {
			CoverageTarget::Scope { run_number, detector_id, data_pass_id, simulation_pass_id } => {
				let pass = PassContext::from_options(data_pass_id, simulation_pass_id)
					.map_err(|err| Error::bad_parameter(err.to_string()))?;
				let resolved = self.resolve_scope(&mut tx, run_number, detector_id, pass).await?;

				self.scope_summary(&mut tx, &resolved.scope, &resolved.window(), options).await?
			},
			CoverageTarget::Gaq { data_pass_id, run_number } => {
				let (run, timeline) = self.gaq_timeline_in(&mut tx, data_pass_id, run_number).await?;

				coverage::summarize(&timeline, &scope::run_window(&run), options)
			},
		};

		tx.commit().await?;

		Ok(summary)
	}

	/// GAQ summary of every run in a data pass, keyed by run number.
	pub async fn data_pass_gaq_summary(
		&self,
		data_pass_id: i64,
		options: CoverageOptions,
	) -> Result<BTreeMap<i64, CoverageSummary>> {
		let mut tx = self.db.begin_snapshot().await?;

		if queries::fetch_data_pass(&mut *tx, data_pass_id).await?.is_none() {
			return Err(Error::not_found(format!("Data pass {data_pass_id} not found.")));
		}

		let mut summaries = BTreeMap::new();

		for run_number in queries::data_pass_runs(&mut *tx, data_pass_id).await? {
			let (run, timeline) = self.gaq_timeline_in(&mut tx, data_pass_id, run_number).await?;

			summaries.insert(
				run_number,
				coverage::summarize(&timeline, &scope::run_window(&run), options),
			);
		}

		tx.commit().await?;

		Ok(summaries)
	}

	/// Per-detector summaries of every run holding flags in one pass, keyed by run then detector.
	///
	/// Without a pass the synchronous flags are summarized, optionally limited to one LHC period.
	pub async fn pass_summary(
		&self,
		req: PassSummaryRequest,
	) -> Result<BTreeMap<i64, BTreeMap<i64, CoverageSummary>>> {
		let pass = PassContext::from_options(req.data_pass_id, req.simulation_pass_id)
			.map_err(|err| Error::bad_parameter(err.to_string()))?;

		if req.lhc_period_id.is_some() && pass != PassContext::Synchronous {
			return Err(Error::bad_parameter(
				"An LHC period selects synchronous flags and cannot be combined with a pass.",
			));
		}

		let mut tx = self.db.begin_snapshot().await?;
		let mut runs: HashMap<i64, (RunWindow, Option<i64>)> = HashMap::new();
		let mut summaries: BTreeMap<i64, BTreeMap<i64, CoverageSummary>> = BTreeMap::new();

		for key in queries::pass_scopes(&mut *tx, pass).await? {
			let scope = key.scope();
			let (window, lhc_period_id) = match runs.get(&scope.run_number) {
				Some(run) => *run,
				None => {
					let run = self.fetch_run(&mut tx, scope.run_number).await?;
					let entry = (scope::run_window(&run), run.lhc_period_id);

					runs.insert(scope.run_number, entry);

					entry
				},
			};

			if req.lhc_period_id.is_some() && lhc_period_id != req.lhc_period_id {
				continue;
			}

			let summary = self.scope_summary(&mut tx, &scope, &window, req.options).await?;

			summaries.entry(scope.run_number).or_default().insert(scope.detector_id, summary);
		}

		tx.commit().await?;

		Ok(summaries)
	}

	async fn scope_summary(
		&self,
		conn: &mut PgConnection,
		scope: &Scope,
		window: &RunWindow,
		options: CoverageOptions,
	) -> Result<CoverageSummary> {
		let rows =
			queries::flag_periods(&mut *conn, scope.run_number, scope.pass, &[scope.detector_id])
				.await?;
		let timeline = gaq::build_timeline(window, &group_flag_periods(&rows));

		Ok(coverage::summarize(&timeline, window, options))
	}
}
