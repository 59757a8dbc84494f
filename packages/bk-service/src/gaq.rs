use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use bk_domain::{
	beam::{self, BeamType},
	flag::{DetectorRef, FlagRef, FlagType, PassContext},
	gaq::{self, GaqInput, TimelinePeriod},
};
use bk_storage::{
	models::{Detector, FlagPeriod, Run},
	queries,
};

use crate::{Error, QcService, Result, scope};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetGaqDetectorsRequest {
	pub data_pass_id: i64,
	pub run_numbers: Vec<i64>,
	pub detector_ids: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaqDetectorEntry {
	pub data_pass_id: i64,
	pub run_number: i64,
	pub detector_id: i64,
}

pub(crate) fn detector_ref(detector: &Detector) -> DetectorRef {
	DetectorRef { detector_id: detector.id, name: detector.name.clone() }
}

/// Groups period rows, ordered by flag id, into one aggregation input per flag.
pub(crate) fn group_flag_periods(rows: &[FlagPeriod]) -> Vec<GaqInput> {
	let mut inputs: Vec<GaqInput> = Vec::new();

	for row in rows {
		if let Some(input) = inputs.last_mut()
			&& input.flag.flag_id == row.flag_id
		{
			input.periods.push(row.interval());

			continue;
		}

		inputs.push(GaqInput {
			flag: FlagRef {
				flag_id: row.flag_id,
				detector_id: row.detector_id,
				flag_type: FlagType { bad: row.bad, mc_reproducible: row.mc_reproducible },
				verified: row.verified,
			},
			periods: vec![row.interval()],
		});
	}

	inputs
}

impl QcService {
	/// Replaces the GAQ detector set of each run with `detector_ids`.
	pub async fn set_gaq_detectors(
		&self,
		req: SetGaqDetectorsRequest,
	) -> Result<Vec<GaqDetectorEntry>> {
		let mut tx = self.db.pool.begin().await?;

		self.ensure_data_pass_runs(&mut tx, req.data_pass_id, &req.run_numbers).await?;

		let detector_ids: Vec<i64> =
			req.detector_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
		let detectors = queries::fetch_detectors(&mut *tx, &detector_ids).await?;

		if detectors.len() != detector_ids.len() {
			let known: BTreeSet<i64> = detectors.iter().map(|detector| detector.id).collect();
			let missing: Vec<String> = detector_ids
				.iter()
				.filter(|id| !known.contains(*id))
				.map(ToString::to_string)
				.collect();

			return Err(Error::bad_parameter(format!(
				"No detectors with IDs: ({}).",
				missing.join(",")
			)));
		}

		let mut missing_links = Vec::new();

		for run_number in &req.run_numbers {
			for detector in &detectors {
				if !queries::run_has_detector(&mut *tx, *run_number, detector.id).await? {
					missing_links.push(format!("{run_number}:{}", detector.name));
				}
			}
		}

		if !missing_links.is_empty() {
			return Err(Error::bad_parameter(format!(
				"No association between runs and detectors: {}.",
				missing_links.join(", ")
			)));
		}

		queries::clear_gaq_detectors(&mut *tx, req.data_pass_id, &req.run_numbers).await?;

		let mut entries = Vec::new();

		for run_number in &req.run_numbers {
			for detector in &detectors {
				queries::insert_gaq_detector(&mut *tx, req.data_pass_id, *run_number, detector.id)
					.await?;

				entries.push(GaqDetectorEntry {
					data_pass_id: req.data_pass_id,
					run_number: *run_number,
					detector_id: detector.id,
				});
			}
		}

		tx.commit().await?;

		Ok(entries)
	}

	/// Stores the beam-type default set of each run, restricted to the run's detectors.
	pub async fn use_default_gaq_detectors(
		&self,
		data_pass_id: i64,
		run_numbers: &[i64],
	) -> Result<Vec<GaqDetectorEntry>> {
		let mut tx = self.db.pool.begin().await?;

		self.ensure_data_pass_runs(&mut tx, data_pass_id, run_numbers).await?;
		queries::clear_gaq_detectors(&mut *tx, data_pass_id, run_numbers).await?;

		let mut entries = Vec::new();

		for run_number in run_numbers {
			let run = self.fetch_run(&mut tx, *run_number).await?;

			for detector in self.default_detectors(&mut tx, &run).await? {
				queries::insert_gaq_detector(&mut *tx, data_pass_id, run.run_number, detector.detector_id)
					.await?;

				entries.push(GaqDetectorEntry {
					data_pass_id,
					run_number: run.run_number,
					detector_id: detector.detector_id,
				});
			}
		}

		tx.commit().await?;

		Ok(entries)
	}

	/// The explicit GAQ detector set, or the beam-type default when none is stored.
	pub async fn gaq_detectors(&self, data_pass_id: i64, run_number: i64) -> Result<Vec<DetectorRef>> {
		let mut tx = self.db.begin_snapshot().await?;
		let detectors = self.gaq_detectors_in(&mut tx, data_pass_id, run_number).await?;

		tx.commit().await?;

		Ok(detectors)
	}

	/// Elementary GAQ timeline of a run within a data pass.
	pub async fn gaq_timeline(&self, data_pass_id: i64, run_number: i64) -> Result<Vec<TimelinePeriod>> {
		let mut tx = self.db.begin_snapshot().await?;
		let timeline = self.gaq_timeline_in(&mut tx, data_pass_id, run_number).await?.1;

		tx.commit().await?;

		Ok(timeline)
	}

	pub(crate) async fn gaq_timeline_in(
		&self,
		conn: &mut PgConnection,
		data_pass_id: i64,
		run_number: i64,
	) -> Result<(Run, Vec<TimelinePeriod>)> {
		let detectors = self.gaq_detectors_in(conn, data_pass_id, run_number).await?;
		let run = self.fetch_run(conn, run_number).await?;
		let detector_ids: Vec<i64> = detectors.iter().map(|detector| detector.detector_id).collect();
		let rows = queries::flag_periods(
			&mut *conn,
			run_number,
			PassContext::DataPass(data_pass_id),
			&detector_ids,
		)
		.await?;
		let timeline = gaq::build_timeline(&scope::run_window(&run), &group_flag_periods(&rows));

		tracing::debug!(
			data_pass_id,
			run_number,
			detectors = detector_ids.len(),
			periods = timeline.len(),
			"Built GAQ timeline."
		);

		Ok((run, timeline))
	}

	async fn gaq_detectors_in(
		&self,
		conn: &mut PgConnection,
		data_pass_id: i64,
		run_number: i64,
	) -> Result<Vec<DetectorRef>> {
		self.ensure_data_pass_runs(conn, data_pass_id, &[run_number]).await?;

		let explicit = queries::gaq_detectors(&mut *conn, data_pass_id, run_number).await?;

		if !explicit.is_empty() {
			return Ok(explicit.iter().map(detector_ref).collect());
		}

		let run = self.fetch_run(conn, run_number).await?;

		self.default_detectors(conn, &run).await
	}

	async fn default_detectors(&self, conn: &mut PgConnection, run: &Run) -> Result<Vec<DetectorRef>> {
		let run_detectors: Vec<DetectorRef> = queries::run_detectors(&mut *conn, run.run_number)
			.await?
			.iter()
			.map(detector_ref)
			.collect();
		let beam = BeamType::from_pdp(run.pdp_beam_type.as_deref());

		Ok(beam::default_gaq_detectors_for_run(beam, &run_detectors))
	}

	/// Data pass exists (NotFound) and holds every run (BadParameter).
	async fn ensure_data_pass_runs(
		&self,
		conn: &mut PgConnection,
		data_pass_id: i64,
		run_numbers: &[i64],
	) -> Result<()> {
		if queries::fetch_data_pass(&mut *conn, data_pass_id).await?.is_none() {
			return Err(Error::not_found(format!("Data pass {data_pass_id} not found.")));
		}

		let linked: BTreeSet<i64> =
			queries::data_pass_runs(&mut *conn, data_pass_id).await?.into_iter().collect();
		let missing: Vec<String> = run_numbers
			.iter()
			.filter(|run_number| !linked.contains(*run_number))
			.map(ToString::to_string)
			.collect();

		if !missing.is_empty() {
			return Err(Error::bad_parameter(format!(
				"No association between data pass with id {data_pass_id} and following runs: {}.",
				missing.join(",")
			)));
		}

		Ok(())
	}
}
