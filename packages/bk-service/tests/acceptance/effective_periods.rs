use bk_service::{
	Bound, CreateFlagsRequest, DeleteRequest, FlagSpec, Interval, PassContext, Scope,
};

use super::{RUN, admin, at, fixture, iv};

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn newer_flags_win_and_deletion_restores_older_coverage() {
	let Some(fx) = fixture("newer_flags_win_and_deletion_restores_older_coverage").await else {
		return;
	};
	let whole = fx.flag(fx.tpc, None, None, fx.bad).await;
	let wide = fx.flag(fx.tpc, Some(at(10, 0)), Some(at(18, 0)), fx.bad).await;
	let middle = fx.flag(fx.tpc, Some(at(12, 0)), Some(at(16, 0)), fx.bad).await;
	let narrow = fx.flag(fx.tpc, Some(at(13, 30)), Some(at(14, 30)), fx.bad).await;

	assert_eq!(whole.interval, Interval::WHOLE_RUN);
	assert_eq!(narrow.effective_periods, vec![iv(at(13, 30), at(14, 30))]);

	let service = &fx.service;

	assert_eq!(
		service.effective_periods(whole.flag_id).await.expect("Failed to read periods."),
		vec![
			Interval { from: Bound::Unbounded, to: Bound::At(at(10, 0)) },
			Interval { from: Bound::At(at(18, 0)), to: Bound::Unbounded },
		]
	);
	assert_eq!(
		service.effective_periods(wide.flag_id).await.expect("Failed to read periods."),
		vec![iv(at(10, 0), at(12, 0)), iv(at(16, 0), at(18, 0))]
	);
	assert_eq!(
		service.effective_periods(middle.flag_id).await.expect("Failed to read periods."),
		vec![iv(at(12, 0), at(13, 30)), iv(at(14, 30), at(16, 0))]
	);

	let deleted = service
		.delete_flag(DeleteRequest { flag_id: middle.flag_id, actor: admin(fx.author) })
		.await
		.expect("Failed to delete QC flag.");

	assert_eq!(deleted.scope, Scope::new(RUN, fx.tpc, PassContext::DataPass(fx.data_pass)));
	assert!(deleted.effective_periods.iter().all(|period| period.flag_id != middle.flag_id));
	assert_eq!(
		service.effective_periods(wide.flag_id).await.expect("Failed to read periods."),
		vec![iv(at(10, 0), at(13, 30)), iv(at(14, 30), at(18, 0))]
	);
	assert_eq!(
		service.effective_periods(narrow.flag_id).await.expect("Failed to read periods."),
		vec![iv(at(13, 30), at(14, 30))]
	);
	assert!(
		service
			.effective_periods(middle.flag_id)
			.await
			.expect("Failed to read periods.")
			.is_empty()
	);
	assert!(service.check_all_scopes().await.expect("Failed to check scopes.").is_empty());

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn bounds_on_run_edges_are_stored_open() {
	let Some(fx) = fixture("bounds_on_run_edges_are_stored_open").await else {
		return;
	};
	let created = fx.flag(fx.its, Some(at(8, 0)), Some(at(12, 0)), fx.bad).await;

	assert_eq!(created.interval, Interval { from: Bound::Unbounded, to: Bound::At(at(12, 0)) });
	assert_eq!(created.effective_periods, vec![created.interval]);

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn intervals_outside_the_run_are_skipped() {
	let Some(fx) = fixture("intervals_outside_the_run_are_skipped").await else {
		return;
	};
	let request = |flags: Vec<FlagSpec>| CreateFlagsRequest {
		run_number: RUN,
		detector_id: fx.tpc,
		data_pass_id: Some(fx.data_pass),
		simulation_pass_id: None,
		actor: admin(fx.author),
		flags,
	};
	let spec = |from, to| FlagSpec { from: Some(from), to: Some(to), flag_type_id: fx.bad, comment: None };
	let created = fx
		.service
		.create_flags(request(vec![spec(at(7, 0), at(9, 0))]))
		.await
		.expect("Rejected intervals must not fail the request.");

	assert!(created.is_empty());

	let created = fx
		.service
		.create_flags(request(vec![
			spec(at(19, 0), at(21, 0)),
			spec(at(11, 0), at(10, 0)),
			spec(at(9, 0), at(10, 0)),
		]))
		.await
		.expect("Failed to create QC flags.");

	assert_eq!(created.len(), 1);
	assert_eq!(created[0].interval, iv(at(9, 0), at(10, 0)));

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn recompute_repairs_tampered_periods() {
	let Some(fx) = fixture("recompute_repairs_tampered_periods").await else {
		return;
	};
	let older = fx.flag(fx.tpc, Some(at(9, 0)), Some(at(15, 0)), fx.bad).await;

	fx.flag(fx.tpc, Some(at(11, 0)), Some(at(12, 0)), fx.bad).await;

	sqlx::query("DELETE FROM qc_flag_effective_periods WHERE flag_id = $1")
		.bind(older.flag_id)
		.execute(&fx.service.db.pool)
		.await
		.expect("Failed to tamper with periods.");

	let violations = fx.service.check_all_scopes().await.expect("Failed to check scopes.");

	assert_eq!(violations.len(), 1);
	assert_eq!(violations[0].scope.detector_id, fx.tpc);

	let reports = fx.service.recompute_all().await.expect("Failed to recompute scopes.");

	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].periods, 3);
	assert!(fx.service.check_all_scopes().await.expect("Failed to check scopes.").is_empty());
	assert_eq!(
		fx.service.effective_periods(older.flag_id).await.expect("Failed to read periods."),
		vec![iv(at(9, 0), at(11, 0)), iv(at(12, 0), at(15, 0))]
	);

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn passes_hold_independent_scopes() {
	let Some(fx) = fixture("passes_hold_independent_scopes").await else {
		return;
	};
	let simulation_pass = bk_testkit::seed::simulation_pass(&fx.service.db.pool, "LHC24a_mc", &[RUN])
		.await
		.expect("Failed to seed simulation pass.");
	let reconstructed = fx.flag(fx.tpc, Some(at(9, 0)), Some(at(10, 0)), fx.bad).await;
	let request = |data_pass_id, simulation_pass_id| CreateFlagsRequest {
		run_number: RUN,
		detector_id: fx.tpc,
		data_pass_id,
		simulation_pass_id,
		actor: admin(fx.author),
		flags: vec![FlagSpec { from: None, to: None, flag_type_id: fx.bad, comment: None }],
	};
	let simulated = fx
		.service
		.create_flags(request(None, Some(simulation_pass)))
		.await
		.expect("Failed to create simulation pass flag.");
	let synchronous = fx
		.service
		.create_flags(request(None, None))
		.await
		.expect("Failed to create synchronous flag.");

	assert_eq!(simulated[0].pass, PassContext::SimulationPass(simulation_pass));
	assert_eq!(synchronous[0].pass, PassContext::Synchronous);
	assert_eq!(simulated[0].effective_periods, vec![Interval::WHOLE_RUN]);
	assert_eq!(
		fx.service.effective_periods(reconstructed.flag_id).await.expect("Failed to read periods."),
		vec![iv(at(9, 0), at(10, 0))]
	);

	let reports = fx.service.recompute_all().await.expect("Failed to recompute scopes.");

	assert_eq!(reports.len(), 3);

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn new_flags_stay_newest_when_stored_times_run_ahead() {
	let Some(fx) = fixture("new_flags_stay_newest_when_stored_times_run_ahead").await else {
		return;
	};
	let ahead = fx.flag(fx.tpc, None, None, fx.bad).await;
	let skewed: time::OffsetDateTime = sqlx::query_scalar(
		"UPDATE qc_flags SET created_at = created_at + interval '1 hour' WHERE id = $1 RETURNING created_at",
	)
	.bind(ahead.flag_id)
	.fetch_one(&fx.service.db.pool)
	.await
	.expect("Failed to move creation time.");
	let newer = fx.flag(fx.tpc, Some(at(10, 0)), Some(at(12, 0)), fx.bad).await;

	assert!(newer.created_at > skewed);
	assert_eq!(newer.effective_periods, vec![iv(at(10, 0), at(12, 0))]);
	assert_eq!(
		fx.service.effective_periods(ahead.flag_id).await.expect("Failed to read periods."),
		vec![
			Interval { from: Bound::Unbounded, to: Bound::At(at(10, 0)) },
			Interval { from: Bound::At(at(12, 0)), to: Bound::Unbounded },
		]
	);

	fx.cleanup().await;
}
