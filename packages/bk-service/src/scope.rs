//! Scope resolution, permission checks and the locked recomputation step shared by writers.

use sqlx::PgConnection;

use bk_domain::{
	access::{self, Actor, UserIdentifier},
	effective::{self, EffectivePeriod, ScopedFlag},
	flag::{PassContext, Scope},
	interval::RunWindow,
};
use bk_storage::{
	models::{Detector, QcFlag, Run, User},
	queries,
};

use crate::{Error, QcService, Result};

pub(crate) struct ResolvedScope {
	pub(crate) scope: Scope,
	pub(crate) run: Run,
	pub(crate) detector: Detector,
	pub(crate) frozen: bool,
}
impl ResolvedScope {
	pub(crate) fn window(&self) -> RunWindow {
		run_window(&self.run)
	}
}

pub(crate) fn run_window(run: &Run) -> RunWindow {
	RunWindow::new(run.qc_time_start, run.qc_time_end)
}

pub(crate) fn scoped_flag(flag: &QcFlag) -> ScopedFlag {
	ScopedFlag {
		flag_id: flag.id,
		created_at: flag.created_at,
		declared: flag.declared(),
		deleted: flag.deleted,
	}
}

impl QcService {
	/// Validates that run, detector and pass exist and are associated with each other.
	pub(crate) async fn resolve_scope(
		&self,
		conn: &mut PgConnection,
		run_number: i64,
		detector_id: i64,
		pass: PassContext,
	) -> Result<ResolvedScope> {
		let run = self.fetch_run(conn, run_number).await?;
		let detector = queries::fetch_detector(&mut *conn, detector_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("Detector {detector_id} not found.")))?;

		if self.cfg.qc.non_qc_detectors.iter().any(|name| name.eq_ignore_ascii_case(&detector.name)) {
			return Err(Error::bad_parameter(format!(
				"Detector {} does not take QC flags.",
				detector.name
			)));
		}

		let frozen = match pass {
			PassContext::DataPass(id) =>
				queries::fetch_data_pass(&mut *conn, id)
					.await?
					.ok_or_else(|| Error::not_found(format!("Data pass {id} not found.")))?
					.frozen,
			PassContext::SimulationPass(id) => {
				if !queries::simulation_pass_exists(&mut *conn, id).await? {
					return Err(Error::not_found(format!("Simulation pass {id} not found.")));
				}

				false
			},
			PassContext::Synchronous => false,
		};

		if !queries::run_in_pass(&mut *conn, run_number, pass).await? {
			return Err(Error::bad_parameter(format!(
				"Run {run_number} is not associated with {pass}."
			)));
		}
		if !queries::run_has_detector(&mut *conn, run_number, detector_id).await? {
			return Err(Error::bad_parameter(format!(
				"Detector {} did not take part in run {run_number}.",
				detector.name
			)));
		}

		Ok(ResolvedScope { scope: Scope::new(run_number, detector_id, pass), run, detector, frozen })
	}

	pub(crate) async fn fetch_run(&self, conn: &mut PgConnection, run_number: i64) -> Result<Run> {
		queries::fetch_run(&mut *conn, run_number)
			.await?
			.ok_or_else(|| Error::not_found(format!("Run {run_number} not found.")))
	}

	pub(crate) async fn resolve_user(
		&self,
		conn: &mut PgConnection,
		identifier: UserIdentifier,
	) -> Result<User> {
		let user = match identifier {
			UserIdentifier::Id(id) => queries::fetch_user_by_id(&mut *conn, id).await?,
			UserIdentifier::ExternalId(id) => queries::fetch_user_by_external_id(&mut *conn, id).await?,
		};

		user.ok_or_else(|| Error::not_found("User not found."))
	}

	pub(crate) fn ensure_can_manage(&self, actor: &Actor, detector: &Detector) -> Result<()> {
		if access::can_manage_detector(&self.cfg.access, &actor.roles, &detector.name) {
			return Ok(());
		}

		Err(Error::access_denied(format!("Not allowed to manage {} flags.", detector.name)))
	}

	/// Recomputes and stores the effective periods of a scope. The caller holds the scope lock.
	pub(crate) async fn recompute_locked(
		&self,
		conn: &mut PgConnection,
		scope: &Scope,
	) -> Result<Vec<EffectivePeriod>> {
		let flags: Vec<ScopedFlag> =
			queries::load_scope_flags(&mut *conn, scope).await?.iter().map(scoped_flag).collect();
		let periods = effective::recompute(&flags);

		queries::replace_effective_periods(conn, scope, &periods).await?;

		tracing::debug!(
			run_number = scope.run_number,
			detector_id = scope.detector_id,
			pass = %scope.pass,
			flags = flags.len(),
			periods = periods.len(),
			"Recomputed effective periods."
		);

		Ok(periods)
	}
}
