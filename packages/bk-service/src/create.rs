use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, serde::rfc3339};

use bk_domain::{
	access::Actor,
	effective,
	flag::PassContext,
	interval::{Bound, Interval},
};
use bk_storage::queries::{self, NewQcFlag};

use crate::{Error, QcService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlagSpec {
	#[serde(default, with = "rfc3339::option")]
	pub from: Option<OffsetDateTime>,
	#[serde(default, with = "rfc3339::option")]
	pub to: Option<OffsetDateTime>,
	pub flag_type_id: i64,
	#[serde(default)]
	pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateFlagsRequest {
	pub run_number: i64,
	pub detector_id: i64,
	#[serde(default)]
	pub data_pass_id: Option<i64>,
	#[serde(default)]
	pub simulation_pass_id: Option<i64>,
	pub actor: Actor,
	pub flags: Vec<FlagSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedFlag {
	pub flag_id: i64,
	pub run_number: i64,
	pub detector_id: i64,
	pub pass: PassContext,
	pub flag_type_id: i64,
	pub interval: Interval,
	pub comment: Option<String>,
	pub created_by: i64,
	#[serde(with = "rfc3339")]
	pub created_at: OffsetDateTime,
	pub effective_periods: Vec<Interval>,
}

impl QcService {
	/// Creates flags in one scope and recomputes the scope's effective periods.
	///
	/// A flag whose interval is inverted, leaves the run's QC window, or pins a bound the run
	/// cannot resolve is skipped with a warning, so the result may be shorter than the request
	/// or empty.
	pub async fn create_flags(&self, req: CreateFlagsRequest) -> Result<Vec<CreatedFlag>> {
		let pass = PassContext::from_options(req.data_pass_id, req.simulation_pass_id)
			.map_err(|err| Error::bad_parameter(err.to_string()))?;
		let mut tx = self.db.pool.begin().await?;
		let resolved =
			self.resolve_scope(&mut tx, req.run_number, req.detector_id, pass).await?;

		if resolved.frozen {
			return Err(Error::conflict("Data pass is frozen."));
		}

		self.ensure_can_manage(&req.actor, &resolved.detector)?;

		let user = self.resolve_user(&mut tx, req.actor.user).await?;
		let scope = resolved.scope;
		let window = resolved.window();

		queries::lock_scope(&mut tx, &scope).await?;

		let mut accepted = Vec::with_capacity(req.flags.len());

		for spec in &req.flags {
			let flag_type = queries::fetch_flag_type(&mut *tx, spec.flag_type_id)
				.await?
				.ok_or_else(|| {
					Error::not_found(format!("Flag type {} not found.", spec.flag_type_id))
				})?;

			if flag_type.archived {
				return Err(Error::bad_parameter(format!(
					"Flag type {} is archived.",
					flag_type.method
				)));
			}

			let checked = Interval::new(Bound::from(spec.from), Bound::from(spec.to))
				.and_then(|interval| interval.check_against_window(&window).map(|()| interval));

			match checked {
				Ok(interval) =>
					accepted.push((flag_type.id, interval.normalize_to_window(&window), spec)),
				Err(rejection) => {
					tracing::warn!(
						run_number = scope.run_number,
						detector_id = scope.detector_id,
						pass = %scope.pass,
						reason = %rejection,
						"Skipping QC flag with an interval the run cannot hold."
					);
				},
			}
		}

		if accepted.is_empty() {
			tx.commit().await?;

			return Ok(Vec::new());
		}

		let live = queries::count_scope_flags(&mut *tx, &scope).await?;
		let cap = i64::from(self.cfg.qc.max_flags_per_scope);

		if live.saturating_add(accepted.len() as i64) > cap {
			return Err(Error::bad_parameter(format!(
				"Scope {scope} would exceed {cap} flags."
			)));
		}

		let base = creation_base(
			truncate_to_micros(OffsetDateTime::now_utc()),
			queries::latest_scope_created_at(&mut *tx, &scope).await?,
		);
		let mut inserted = Vec::with_capacity(accepted.len());

		for (offset, (flag_type_id, interval, spec)) in accepted.into_iter().enumerate() {
			let row = queries::insert_flag(
				&mut *tx,
				&NewQcFlag {
					scope: &scope,
					flag_type_id,
					interval,
					comment: spec.comment.as_deref(),
					created_by: user.id,
					created_at: base + Duration::microseconds(offset as i64),
				},
			)
			.await?;

			inserted.push(row);
		}

		let periods = self.recompute_locked(&mut tx, &scope).await?;

		tx.commit().await?;

		tracing::info!(
			run_number = scope.run_number,
			detector_id = scope.detector_id,
			pass = %scope.pass,
			created = inserted.len(),
			"Created QC flags."
		);

		Ok(inserted
			.into_iter()
			.map(|row| CreatedFlag {
				flag_id: row.id,
				run_number: row.run_number,
				detector_id: row.detector_id,
				pass: row.pass(),
				flag_type_id: row.flag_type_id,
				interval: row.declared(),
				effective_periods: effective::periods_of(&periods, row.id),
				comment: row.comment,
				created_by: row.created_by,
				created_at: row.created_at,
			})
			.collect())
	}
}

/// First creation time for a batch: after every flag already stored in the scope, even when the
/// clock that wrote them ran ahead of ours.
fn creation_base(now: OffsetDateTime, latest: Option<OffsetDateTime>) -> OffsetDateTime {
	match latest {
		Some(latest) if latest >= now => latest + Duration::microseconds(1),
		_ => now,
	}
}

/// Postgres keeps microseconds; stored and in-memory creation times must compare equal.
fn truncate_to_micros(at: OffsetDateTime) -> OffsetDateTime {
	at - Duration::nanoseconds(i64::from(at.nanosecond() % 1_000))
}
