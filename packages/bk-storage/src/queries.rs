use sqlx::{PgConnection, PgExecutor};
use time::OffsetDateTime;

use bk_domain::{
	effective::EffectivePeriod as DomainPeriod,
	flag::{PassContext, Scope},
	interval::Interval,
};

use crate::{
	Result,
	models::{
		DataPass, Detector, EffectivePeriod, FlagPeriod, QcFlag, QcFlagType, Run, ScopeKey, User,
		Verification,
	},
};

const QC_FLAG_COLUMNS: &str = "\
id,
	run_number,
	detector_id,
	data_pass_id,
	simulation_pass_id,
	flag_type_id,
	from_ts,
	to_ts,
	comment,
	deleted,
	created_by,
	created_at";

pub struct NewQcFlag<'a> {
	pub scope: &'a Scope,
	pub flag_type_id: i64,
	pub interval: Interval,
	pub comment: Option<&'a str>,
	pub created_by: i64,
	pub created_at: OffsetDateTime,
}

/// Advisory lock key of a scope: the first eight bytes of its BLAKE3 digest.
pub fn scope_lock_key(scope: &Scope) -> i64 {
	let digest = blake3::hash(scope.lock_material().as_bytes());
	let mut key = [0_u8; 8];

	key.copy_from_slice(&digest.as_bytes()[..8]);

	i64::from_le_bytes(key)
}

/// Serializes writers of one scope until the surrounding transaction ends.
pub async fn lock_scope(conn: &mut PgConnection, scope: &Scope) -> Result<()> {
	sqlx::query("SELECT pg_advisory_xact_lock($1)")
		.bind(scope_lock_key(scope))
		.execute(conn)
		.await?;

	Ok(())
}

pub async fn fetch_run<'e, E>(executor: E, run_number: i64) -> Result<Option<Run>>
where
	E: PgExecutor<'e>,
{
	let run = sqlx::query_as::<_, Run>(
		"\
SELECT run_number, qc_time_start, qc_time_end, pdp_beam_type, lhc_period_id
FROM runs
WHERE run_number = $1",
	)
	.bind(run_number)
	.fetch_optional(executor)
	.await?;

	Ok(run)
}

pub async fn fetch_detector<'e, E>(executor: E, detector_id: i64) -> Result<Option<Detector>>
where
	E: PgExecutor<'e>,
{
	let detector = sqlx::query_as::<_, Detector>("SELECT id, name FROM detectors WHERE id = $1")
		.bind(detector_id)
		.fetch_optional(executor)
		.await?;

	Ok(detector)
}

pub async fn fetch_detectors<'e, E>(executor: E, detector_ids: &[i64]) -> Result<Vec<Detector>>
where
	E: PgExecutor<'e>,
{
	let detectors = sqlx::query_as::<_, Detector>(
		"SELECT id, name FROM detectors WHERE id = ANY($1) ORDER BY name",
	)
	.bind(detector_ids)
	.fetch_all(executor)
	.await?;

	Ok(detectors)
}

/// Detectors that took part in a run, ordered by name.
pub async fn run_detectors<'e, E>(executor: E, run_number: i64) -> Result<Vec<Detector>>
where
	E: PgExecutor<'e>,
{
	let detectors = sqlx::query_as::<_, Detector>(
		"\
SELECT d.id, d.name
FROM detectors d
JOIN run_detectors rd ON rd.detector_id = d.id
WHERE rd.run_number = $1
ORDER BY d.name",
	)
	.bind(run_number)
	.fetch_all(executor)
	.await?;

	Ok(detectors)
}

pub async fn fetch_data_pass<'e, E>(executor: E, data_pass_id: i64) -> Result<Option<DataPass>>
where
	E: PgExecutor<'e>,
{
	let data_pass =
		sqlx::query_as::<_, DataPass>("SELECT id, name, frozen FROM data_passes WHERE id = $1")
			.bind(data_pass_id)
			.fetch_optional(executor)
			.await?;

	Ok(data_pass)
}

pub async fn simulation_pass_exists<'e, E>(executor: E, simulation_pass_id: i64) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let exists: bool =
		sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM simulation_passes WHERE id = $1)")
			.bind(simulation_pass_id)
			.fetch_one(executor)
			.await?;

	Ok(exists)
}

/// Whether the run belongs to the pass. Synchronous flags need no pass association.
pub async fn run_in_pass<'e, E>(executor: E, run_number: i64, pass: PassContext) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let linked: bool = match pass {
		PassContext::DataPass(id) =>
			sqlx::query_scalar(
				"\
SELECT EXISTS (SELECT 1 FROM data_pass_runs WHERE data_pass_id = $1 AND run_number = $2)",
			)
			.bind(id)
			.bind(run_number)
			.fetch_one(executor)
			.await?,
		PassContext::SimulationPass(id) =>
			sqlx::query_scalar(
				"\
SELECT EXISTS (
	SELECT 1 FROM simulation_pass_runs WHERE simulation_pass_id = $1 AND run_number = $2
)",
			)
			.bind(id)
			.bind(run_number)
			.fetch_one(executor)
			.await?,
		PassContext::Synchronous => true,
	};

	Ok(linked)
}

pub async fn run_has_detector<'e, E>(executor: E, run_number: i64, detector_id: i64) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let linked: bool = sqlx::query_scalar(
		"SELECT EXISTS (SELECT 1 FROM run_detectors WHERE run_number = $1 AND detector_id = $2)",
	)
	.bind(run_number)
	.bind(detector_id)
	.fetch_one(executor)
	.await?;

	Ok(linked)
}

/// Run numbers of a data pass, ascending.
pub async fn data_pass_runs<'e, E>(executor: E, data_pass_id: i64) -> Result<Vec<i64>>
where
	E: PgExecutor<'e>,
{
	let runs: Vec<i64> = sqlx::query_scalar(
		"SELECT run_number FROM data_pass_runs WHERE data_pass_id = $1 ORDER BY run_number",
	)
	.bind(data_pass_id)
	.fetch_all(executor)
	.await?;

	Ok(runs)
}

pub async fn fetch_user_by_id<'e, E>(executor: E, user_id: i64) -> Result<Option<User>>
where
	E: PgExecutor<'e>,
{
	let user = sqlx::query_as::<_, User>("SELECT id, external_id, name FROM users WHERE id = $1")
		.bind(user_id)
		.fetch_optional(executor)
		.await?;

	Ok(user)
}

pub async fn fetch_user_by_external_id<'e, E>(executor: E, external_id: i64) -> Result<Option<User>>
where
	E: PgExecutor<'e>,
{
	let user = sqlx::query_as::<_, User>(
		"SELECT id, external_id, name FROM users WHERE external_id = $1",
	)
	.bind(external_id)
	.fetch_optional(executor)
	.await?;

	Ok(user)
}

pub async fn fetch_flag_type<'e, E>(executor: E, flag_type_id: i64) -> Result<Option<QcFlagType>>
where
	E: PgExecutor<'e>,
{
	let flag_type = sqlx::query_as::<_, QcFlagType>(
		"SELECT id, name, method, bad, mc_reproducible, archived FROM qc_flag_types WHERE id = $1",
	)
	.bind(flag_type_id)
	.fetch_optional(executor)
	.await?;

	Ok(flag_type)
}

pub async fn insert_flag<'e, E>(executor: E, flag: &NewQcFlag<'_>) -> Result<QcFlag>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
INSERT INTO qc_flags (
	run_number,
	detector_id,
	data_pass_id,
	simulation_pass_id,
	flag_type_id,
	from_ts,
	to_ts,
	comment,
	created_by,
	created_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
RETURNING {QC_FLAG_COLUMNS}"
	);
	let row = sqlx::query_as::<_, QcFlag>(&sql)
		.bind(flag.scope.run_number)
		.bind(flag.scope.detector_id)
		.bind(flag.scope.pass.data_pass_id())
		.bind(flag.scope.pass.simulation_pass_id())
		.bind(flag.flag_type_id)
		.bind(flag.interval.from.as_option())
		.bind(flag.interval.to.as_option())
		.bind(flag.comment)
		.bind(flag.created_by)
		.bind(flag.created_at)
		.fetch_one(executor)
		.await?;

	Ok(row)
}

pub async fn fetch_flag<'e, E>(executor: E, flag_id: i64) -> Result<Option<QcFlag>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT {QC_FLAG_COLUMNS} FROM qc_flags WHERE id = $1");
	let flag = sqlx::query_as::<_, QcFlag>(&sql).bind(flag_id).fetch_optional(executor).await?;

	Ok(flag)
}

pub async fn fetch_flag_for_update(conn: &mut PgConnection, flag_id: i64) -> Result<Option<QcFlag>> {
	let sql = format!("SELECT {QC_FLAG_COLUMNS} FROM qc_flags WHERE id = $1 FOR UPDATE");
	let flag = sqlx::query_as::<_, QcFlag>(&sql).bind(flag_id).fetch_optional(conn).await?;

	Ok(flag)
}

/// Non-deleted flags of a scope in creation order.
pub async fn load_scope_flags<'e, E>(executor: E, scope: &Scope) -> Result<Vec<QcFlag>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {QC_FLAG_COLUMNS}
FROM qc_flags
WHERE run_number = $1
	AND detector_id = $2
	AND data_pass_id IS NOT DISTINCT FROM $3::bigint
	AND simulation_pass_id IS NOT DISTINCT FROM $4::bigint
	AND NOT deleted
ORDER BY created_at, id"
	);
	let flags = sqlx::query_as::<_, QcFlag>(&sql)
		.bind(scope.run_number)
		.bind(scope.detector_id)
		.bind(scope.pass.data_pass_id())
		.bind(scope.pass.simulation_pass_id())
		.fetch_all(executor)
		.await?;

	Ok(flags)
}

pub async fn count_scope_flags<'e, E>(executor: E, scope: &Scope) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let count: i64 = sqlx::query_scalar(
		"\
SELECT count(*)
FROM qc_flags
WHERE run_number = $1
	AND detector_id = $2
	AND data_pass_id IS NOT DISTINCT FROM $3::bigint
	AND simulation_pass_id IS NOT DISTINCT FROM $4::bigint
	AND NOT deleted",
	)
	.bind(scope.run_number)
	.bind(scope.detector_id)
	.bind(scope.pass.data_pass_id())
	.bind(scope.pass.simulation_pass_id())
	.fetch_one(executor)
	.await?;

	Ok(count)
}

/// Newest creation time of any flag, deleted or not, in a scope.
pub async fn latest_scope_created_at<'e, E>(
	executor: E,
	scope: &Scope,
) -> Result<Option<OffsetDateTime>>
where
	E: PgExecutor<'e>,
{
	let latest: Option<OffsetDateTime> = sqlx::query_scalar(
		"\
SELECT max(created_at)
FROM qc_flags
WHERE run_number = $1
	AND detector_id = $2
	AND data_pass_id IS NOT DISTINCT FROM $3::bigint
	AND simulation_pass_id IS NOT DISTINCT FROM $4::bigint",
	)
	.bind(scope.run_number)
	.bind(scope.detector_id)
	.bind(scope.pass.data_pass_id())
	.bind(scope.pass.simulation_pass_id())
	.fetch_one(executor)
	.await?;

	Ok(latest)
}

/// Stored effective periods of every flag in a scope.
pub async fn load_scope_periods<'e, E>(executor: E, scope: &Scope) -> Result<Vec<EffectivePeriod>>
where
	E: PgExecutor<'e>,
{
	let periods = sqlx::query_as::<_, EffectivePeriod>(
		"\
SELECT p.flag_id, p.from_ts, p.to_ts
FROM qc_flag_effective_periods p
JOIN qc_flags f ON f.id = p.flag_id
WHERE f.run_number = $1
	AND f.detector_id = $2
	AND f.data_pass_id IS NOT DISTINCT FROM $3::bigint
	AND f.simulation_pass_id IS NOT DISTINCT FROM $4::bigint
ORDER BY p.flag_id, p.from_ts NULLS FIRST",
	)
	.bind(scope.run_number)
	.bind(scope.detector_id)
	.bind(scope.pass.data_pass_id())
	.bind(scope.pass.simulation_pass_id())
	.fetch_all(executor)
	.await?;

	Ok(periods)
}

/// Replaces every effective-period row of the scope with `periods`.
pub async fn replace_effective_periods(
	conn: &mut PgConnection,
	scope: &Scope,
	periods: &[DomainPeriod],
) -> Result<()> {
	sqlx::query(
		"\
DELETE FROM qc_flag_effective_periods p
USING qc_flags f
WHERE p.flag_id = f.id
	AND f.run_number = $1
	AND f.detector_id = $2
	AND f.data_pass_id IS NOT DISTINCT FROM $3::bigint
	AND f.simulation_pass_id IS NOT DISTINCT FROM $4::bigint",
	)
	.bind(scope.run_number)
	.bind(scope.detector_id)
	.bind(scope.pass.data_pass_id())
	.bind(scope.pass.simulation_pass_id())
	.execute(&mut *conn)
	.await?;

	for period in periods {
		sqlx::query(
			"INSERT INTO qc_flag_effective_periods (flag_id, from_ts, to_ts) VALUES ($1,$2,$3)",
		)
		.bind(period.flag_id)
		.bind(period.interval.from.as_option())
		.bind(period.interval.to.as_option())
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

pub async fn mark_flag_deleted(conn: &mut PgConnection, flag_id: i64) -> Result<()> {
	sqlx::query("UPDATE qc_flags SET deleted = true WHERE id = $1")
		.bind(flag_id)
		.execute(&mut *conn)
		.await?;
	sqlx::query("DELETE FROM qc_flag_effective_periods WHERE flag_id = $1")
		.bind(flag_id)
		.execute(&mut *conn)
		.await?;

	Ok(())
}

/// Effective periods of one flag in time order.
pub async fn flag_effective_periods<'e, E>(executor: E, flag_id: i64) -> Result<Vec<EffectivePeriod>>
where
	E: PgExecutor<'e>,
{
	let periods = sqlx::query_as::<_, EffectivePeriod>(
		"\
SELECT flag_id, from_ts, to_ts
FROM qc_flag_effective_periods
WHERE flag_id = $1
ORDER BY from_ts NULLS FIRST",
	)
	.bind(flag_id)
	.fetch_all(executor)
	.await?;

	Ok(periods)
}

pub async fn flag_verifications<'e, E>(executor: E, flag_id: i64) -> Result<Vec<Verification>>
where
	E: PgExecutor<'e>,
{
	let verifications = sqlx::query_as::<_, Verification>(
		"\
SELECT id, flag_id, comment, created_by, created_at
FROM qc_flag_verifications
WHERE flag_id = $1
ORDER BY created_at, id",
	)
	.bind(flag_id)
	.fetch_all(executor)
	.await?;

	Ok(verifications)
}

pub async fn insert_verification<'e, E>(
	executor: E,
	flag_id: i64,
	comment: Option<&str>,
	created_by: i64,
	created_at: OffsetDateTime,
) -> Result<Verification>
where
	E: PgExecutor<'e>,
{
	let verification = sqlx::query_as::<_, Verification>(
		"\
INSERT INTO qc_flag_verifications (flag_id, comment, created_by, created_at)
VALUES ($1,$2,$3,$4)
RETURNING id, flag_id, comment, created_by, created_at",
	)
	.bind(flag_id)
	.bind(comment)
	.bind(created_by)
	.bind(created_at)
	.fetch_one(executor)
	.await?;

	Ok(verification)
}

/// Removes every flag of a data pass together with its periods and verifications.
pub async fn delete_data_pass_flags<'e, E>(executor: E, data_pass_id: i64) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM qc_flags WHERE data_pass_id = $1")
		.bind(data_pass_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

/// Effective periods with flag metadata for the given detectors of a run and pass.
pub async fn flag_periods<'e, E>(
	executor: E,
	run_number: i64,
	pass: PassContext,
	detector_ids: &[i64],
) -> Result<Vec<FlagPeriod>>
where
	E: PgExecutor<'e>,
{
	let periods = sqlx::query_as::<_, FlagPeriod>(
		"\
SELECT
	f.id AS flag_id,
	f.detector_id,
	t.bad,
	t.mc_reproducible,
	EXISTS (SELECT 1 FROM qc_flag_verifications v WHERE v.flag_id = f.id) AS verified,
	p.from_ts,
	p.to_ts
FROM qc_flags f
JOIN qc_flag_types t ON t.id = f.flag_type_id
JOIN qc_flag_effective_periods p ON p.flag_id = f.id
WHERE f.run_number = $1
	AND f.data_pass_id IS NOT DISTINCT FROM $2::bigint
	AND f.simulation_pass_id IS NOT DISTINCT FROM $3::bigint
	AND f.detector_id = ANY($4)
	AND NOT f.deleted
ORDER BY f.id, p.from_ts NULLS FIRST",
	)
	.bind(run_number)
	.bind(pass.data_pass_id())
	.bind(pass.simulation_pass_id())
	.bind(detector_ids)
	.fetch_all(executor)
	.await?;

	Ok(periods)
}

/// Explicit GAQ detectors of a run within a data pass, ordered by name.
pub async fn gaq_detectors<'e, E>(
	executor: E,
	data_pass_id: i64,
	run_number: i64,
) -> Result<Vec<Detector>>
where
	E: PgExecutor<'e>,
{
	let detectors = sqlx::query_as::<_, Detector>(
		"\
SELECT d.id, d.name
FROM gaq_detectors g
JOIN detectors d ON d.id = g.detector_id
WHERE g.data_pass_id = $1 AND g.run_number = $2
ORDER BY d.name",
	)
	.bind(data_pass_id)
	.bind(run_number)
	.fetch_all(executor)
	.await?;

	Ok(detectors)
}

pub async fn clear_gaq_detectors<'e, E>(
	executor: E,
	data_pass_id: i64,
	run_numbers: &[i64],
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query("DELETE FROM gaq_detectors WHERE data_pass_id = $1 AND run_number = ANY($2)")
		.bind(data_pass_id)
		.bind(run_numbers)
		.execute(executor)
		.await?;

	Ok(())
}

pub async fn insert_gaq_detector<'e, E>(
	executor: E,
	data_pass_id: i64,
	run_number: i64,
	detector_id: i64,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO gaq_detectors (data_pass_id, run_number, detector_id)
VALUES ($1,$2,$3)
ON CONFLICT DO NOTHING",
	)
	.bind(data_pass_id)
	.bind(run_number)
	.bind(detector_id)
	.execute(executor)
	.await?;

	Ok(())
}

/// Distinct `(run, detector)` pairs holding live flags in a pass.
pub async fn pass_scopes<'e, E>(executor: E, pass: PassContext) -> Result<Vec<ScopeKey>>
where
	E: PgExecutor<'e>,
{
	let scopes = sqlx::query_as::<_, ScopeKey>(
		"\
SELECT DISTINCT run_number, detector_id, data_pass_id, simulation_pass_id
FROM qc_flags
WHERE data_pass_id IS NOT DISTINCT FROM $1::bigint
	AND simulation_pass_id IS NOT DISTINCT FROM $2::bigint
	AND NOT deleted
ORDER BY run_number, detector_id",
	)
	.bind(pass.data_pass_id())
	.bind(pass.simulation_pass_id())
	.fetch_all(executor)
	.await?;

	Ok(scopes)
}

/// Scopes holding any flag, deleted ones included, of a data pass.
pub async fn data_pass_flag_scopes<'e, E>(executor: E, data_pass_id: i64) -> Result<Vec<ScopeKey>>
where
	E: PgExecutor<'e>,
{
	let scopes = sqlx::query_as::<_, ScopeKey>(
		"\
SELECT DISTINCT run_number, detector_id, data_pass_id, simulation_pass_id
FROM qc_flags
WHERE data_pass_id = $1
ORDER BY run_number, detector_id",
	)
	.bind(data_pass_id)
	.fetch_all(executor)
	.await?;

	Ok(scopes)
}

/// Every scope that has ever held a flag.
pub async fn all_scopes<'e, E>(executor: E) -> Result<Vec<ScopeKey>>
where
	E: PgExecutor<'e>,
{
	let scopes = sqlx::query_as::<_, ScopeKey>(
		"\
SELECT DISTINCT run_number, detector_id, data_pass_id, simulation_pass_id
FROM qc_flags
ORDER BY run_number, detector_id, data_pass_id NULLS FIRST, simulation_pass_id NULLS FIRST",
	)
	.fetch_all(executor)
	.await?;

	Ok(scopes)
}
