//! Fixture rows for Postgres-backed tests. Helpers that insert a keyed row return its id.

use sqlx::PgPool;
use time::OffsetDateTime;

use crate::Result;

pub async fn user(pool: &PgPool, external_id: i64, name: &str) -> Result<i64> {
	let id: i64 =
		sqlx::query_scalar("INSERT INTO users (external_id, name) VALUES ($1,$2) RETURNING id")
			.bind(external_id)
			.bind(name)
			.fetch_one(pool)
			.await?;

	Ok(id)
}

pub async fn detector(pool: &PgPool, name: &str) -> Result<i64> {
	let id: i64 = sqlx::query_scalar("INSERT INTO detectors (name) VALUES ($1) RETURNING id")
		.bind(name)
		.fetch_one(pool)
		.await?;

	Ok(id)
}

pub async fn run(
	pool: &PgPool,
	run_number: i64,
	qc_time_start: Option<OffsetDateTime>,
	qc_time_end: Option<OffsetDateTime>,
	pdp_beam_type: Option<&str>,
	detector_ids: &[i64],
) -> Result<()> {
	sqlx::query(
		"INSERT INTO runs (run_number, qc_time_start, qc_time_end, pdp_beam_type) VALUES ($1,$2,$3,$4)",
	)
	.bind(run_number)
	.bind(qc_time_start)
	.bind(qc_time_end)
	.bind(pdp_beam_type)
	.execute(pool)
	.await?;

	for detector_id in detector_ids {
		sqlx::query("INSERT INTO run_detectors (run_number, detector_id) VALUES ($1,$2)")
			.bind(run_number)
			.bind(detector_id)
			.execute(pool)
			.await?;
	}

	Ok(())
}

pub async fn assign_lhc_period(pool: &PgPool, run_number: i64, lhc_period_id: i64) -> Result<()> {
	sqlx::query("UPDATE runs SET lhc_period_id = $2 WHERE run_number = $1")
		.bind(run_number)
		.bind(lhc_period_id)
		.execute(pool)
		.await?;

	Ok(())
}

pub async fn data_pass(pool: &PgPool, name: &str, frozen: bool, run_numbers: &[i64]) -> Result<i64> {
	let id: i64 =
		sqlx::query_scalar("INSERT INTO data_passes (name, frozen) VALUES ($1,$2) RETURNING id")
			.bind(name)
			.bind(frozen)
			.fetch_one(pool)
			.await?;

	for run_number in run_numbers {
		sqlx::query("INSERT INTO data_pass_runs (data_pass_id, run_number) VALUES ($1,$2)")
			.bind(id)
			.bind(run_number)
			.execute(pool)
			.await?;
	}

	Ok(id)
}

pub async fn simulation_pass(pool: &PgPool, name: &str, run_numbers: &[i64]) -> Result<i64> {
	let id: i64 =
		sqlx::query_scalar("INSERT INTO simulation_passes (name) VALUES ($1) RETURNING id")
			.bind(name)
			.fetch_one(pool)
			.await?;

	for run_number in run_numbers {
		sqlx::query(
			"INSERT INTO simulation_pass_runs (simulation_pass_id, run_number) VALUES ($1,$2)",
		)
		.bind(id)
		.bind(run_number)
		.execute(pool)
		.await?;
	}

	Ok(id)
}

pub async fn flag_type(
	pool: &PgPool,
	method: &str,
	bad: bool,
	mc_reproducible: bool,
	archived: bool,
) -> Result<i64> {
	let id: i64 = sqlx::query_scalar(
		"\
INSERT INTO qc_flag_types (name, method, bad, mc_reproducible, archived)
VALUES ($1,$1,$2,$3,$4)
RETURNING id",
	)
	.bind(method)
	.bind(bad)
	.bind(mc_reproducible)
	.bind(archived)
	.fetch_one(pool)
	.await?;

	Ok(id)
}
