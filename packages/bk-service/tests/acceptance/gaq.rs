use bk_service::{
	CoverageOptions, CoverageTarget, CreateFlagsRequest, Error, FlagSpec, PassSummaryRequest,
	SetGaqDetectorsRequest,
};
use bk_testkit::seed;

use super::{LHC_PERIOD, RUN, admin, assert_close, at, fixture, iv};

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn gaq_merges_default_detectors_into_one_timeline() {
	let Some(fx) = fixture("gaq_merges_default_detectors_into_one_timeline").await else {
		return;
	};
	let service = &fx.service;
	let tpc = fx.flag(fx.tpc, Some(at(10, 0)), Some(at(12, 0)), fx.bad).await;
	let its = fx.flag(fx.its, Some(at(11, 0)), Some(at(13, 0)), fx.mc_reproducible).await;
	let ft0 = fx.flag(fx.ft0, Some(at(14, 0)), Some(at(16, 0)), fx.good).await;

	// ZDC is not part of the pp default set.
	fx.flag(fx.zdc, None, None, fx.bad).await;

	let detectors = service.gaq_detectors(fx.data_pass, RUN).await.expect("Failed to read GAQ detectors.");
	let names: Vec<&str> = detectors.iter().map(|detector| detector.name.as_str()).collect();

	assert_eq!(names, ["FT0", "ITS", "TPC"]);

	let timeline = service.gaq_timeline(fx.data_pass, RUN).await.expect("Failed to build timeline.");
	let shape: Vec<_> = timeline
		.iter()
		.map(|period| {
			(
				period.interval,
				period.contributing_flags.iter().map(|flag| flag.flag_id).collect::<Vec<_>>(),
			)
		})
		.collect();

	assert_eq!(
		shape,
		vec![
			(iv(at(8, 0), at(10, 0)), vec![]),
			(iv(at(10, 0), at(11, 0)), vec![tpc.flag_id]),
			(iv(at(11, 0), at(12, 0)), vec![tpc.flag_id, its.flag_id]),
			(iv(at(12, 0), at(13, 0)), vec![its.flag_id]),
			(iv(at(13, 0), at(14, 0)), vec![]),
			(iv(at(14, 0), at(16, 0)), vec![ft0.flag_id]),
			(iv(at(16, 0), at(20, 0)), vec![]),
		]
	);

	let target = CoverageTarget::Gaq { data_pass_id: fx.data_pass, run_number: RUN };
	let summary = service
		.coverage_summary(target.clone(), CoverageOptions::default())
		.await
		.expect("Failed to summarize GAQ.");

	assert_close(summary.bad_coverage, 3.0 / 12.0);
	assert_close(summary.not_bad_coverage, 2.0 / 12.0);
	assert!(summary.mc_reproducible);
	assert_eq!(summary.missing_verifications_count, 3);
	assert_eq!(summary.undefined_quality_periods_count, 3);

	let lenient = service
		.coverage_summary(target, CoverageOptions { mc_reproducible_as_not_bad: true })
		.await
		.expect("Failed to summarize GAQ.");

	assert_close(lenient.bad_coverage, 2.0 / 12.0);
	assert_close(lenient.not_bad_coverage, 3.0 / 12.0);

	let per_run = service
		.data_pass_gaq_summary(fx.data_pass, CoverageOptions::default())
		.await
		.expect("Failed to summarize data pass.");

	assert_eq!(per_run.len(), 1);
	assert_eq!(per_run[&RUN], summary);

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn explicit_gaq_detectors_replace_the_default_set() {
	let Some(fx) = fixture("explicit_gaq_detectors_replace_the_default_set").await else {
		return;
	};
	let service = &fx.service;

	fx.flag(fx.tpc, Some(at(10, 0)), Some(at(12, 0)), fx.bad).await;
	fx.flag(fx.its, Some(at(11, 0)), Some(at(13, 0)), fx.bad).await;

	let entries = service
		.set_gaq_detectors(SetGaqDetectorsRequest {
			data_pass_id: fx.data_pass,
			run_numbers: vec![RUN],
			detector_ids: vec![fx.tpc, fx.tpc],
		})
		.await
		.expect("Failed to set GAQ detectors.");

	assert_eq!(entries.len(), 1);

	let summary = service
		.coverage_summary(
			CoverageTarget::Gaq { data_pass_id: fx.data_pass, run_number: RUN },
			CoverageOptions::default(),
		)
		.await
		.expect("Failed to summarize GAQ.");

	assert_close(summary.bad_coverage, 2.0 / 12.0);
	assert_eq!(summary.undefined_quality_periods_count, 2);

	let err = service
		.set_gaq_detectors(SetGaqDetectorsRequest {
			data_pass_id: fx.data_pass,
			run_numbers: vec![RUN + 1],
			detector_ids: vec![fx.tpc],
		})
		.await
		.expect_err("Runs outside the pass must be rejected.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");

	let defaults = service
		.use_default_gaq_detectors(fx.data_pass, &[RUN])
		.await
		.expect("Failed to restore default GAQ detectors.");

	assert_eq!(defaults.len(), 3);

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn per_detector_summaries_cover_each_scope() {
	let Some(fx) = fixture("per_detector_summaries_cover_each_scope").await else {
		return;
	};
	let service = &fx.service;

	fx.flag(fx.tpc, None, None, fx.bad).await;
	fx.flag(fx.its, Some(at(8, 0)), Some(at(11, 0)), fx.mc_reproducible).await;

	let tpc = service
		.coverage_summary(
			CoverageTarget::Scope {
				run_number: RUN,
				detector_id: fx.tpc,
				data_pass_id: Some(fx.data_pass),
				simulation_pass_id: None,
			},
			CoverageOptions::default(),
		)
		.await
		.expect("Failed to summarize scope.");

	assert_close(tpc.bad_coverage, 1.0);
	assert_close(tpc.not_bad_coverage, 0.0);
	assert!(!tpc.mc_reproducible);

	let pass = service
		.pass_summary(PassSummaryRequest {
			data_pass_id: Some(fx.data_pass),
			..PassSummaryRequest::default()
		})
		.await
		.expect("Failed to summarize pass.");
	let run = &pass[&RUN];

	assert_eq!(run.len(), 2);
	assert_eq!(run[&fx.tpc], tpc);
	assert_close(run[&fx.its].bad_coverage, 3.0 / 12.0);
	assert!(run[&fx.its].mc_reproducible);

	let err = service
		.pass_summary(PassSummaryRequest {
			data_pass_id: Some(fx.data_pass),
			simulation_pass_id: Some(1),
			..PassSummaryRequest::default()
		})
		.await
		.expect_err("Two passes must be rejected.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn scope_summaries_require_an_existing_scope() {
	let Some(fx) = fixture("scope_summaries_require_an_existing_scope").await else {
		return;
	};
	let scope_of = |detector_id, data_pass_id| CoverageTarget::Scope {
		run_number: RUN,
		detector_id,
		data_pass_id: Some(data_pass_id),
		simulation_pass_id: None,
	};

	for (target, what) in [
		(scope_of(99_999, fx.data_pass), "Unknown detector"),
		(scope_of(fx.tpc, 99_999), "Unknown data pass"),
	] {
		let err = fx
			.service
			.coverage_summary(target, CoverageOptions::default())
			.await
			.expect_err("Summaries of missing scopes must fail.");

		assert!(matches!(err, Error::NotFound { .. }), "{what}: unexpected error: {err:?}");
	}

	let err = fx
		.service
		.coverage_summary(scope_of(fx.tst, fx.data_pass), CoverageOptions::default())
		.await
		.expect_err("Non-QC detectors have no summary.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn synchronous_summaries_filter_by_lhc_period() {
	let Some(fx) = fixture("synchronous_summaries_filter_by_lhc_period").await else {
		return;
	};
	let service = &fx.service;
	let pool = &service.db.pool;
	let other_run = RUN + 1;

	seed::run(pool, other_run, Some(at(8, 0)), Some(at(20, 0)), Some("pp"), &[fx.tpc])
		.await
		.expect("Failed to seed run.");
	seed::assign_lhc_period(pool, other_run, LHC_PERIOD + 1)
		.await
		.expect("Failed to seed LHC period.");

	for run_number in [RUN, other_run] {
		service
			.create_flags(CreateFlagsRequest {
				run_number,
				detector_id: fx.tpc,
				data_pass_id: None,
				simulation_pass_id: None,
				actor: admin(fx.author),
				flags: vec![FlagSpec { from: None, to: None, flag_type_id: fx.bad, comment: None }],
			})
			.await
			.expect("Failed to create synchronous flag.");
	}

	let runs_of = |lhc_period_id| PassSummaryRequest { lhc_period_id, ..PassSummaryRequest::default() };
	let all = service.pass_summary(runs_of(None)).await.expect("Failed to summarize.");

	assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![RUN, other_run]);

	let period = service.pass_summary(runs_of(Some(LHC_PERIOD))).await.expect("Failed to summarize.");

	assert_eq!(period.keys().copied().collect::<Vec<_>>(), vec![RUN]);
	assert_close(period[&RUN][&fx.tpc].bad_coverage, 1.0);

	let other = service
		.pass_summary(runs_of(Some(LHC_PERIOD + 1)))
		.await
		.expect("Failed to summarize.");

	assert_eq!(other.keys().copied().collect::<Vec<_>>(), vec![other_run]);

	let err = service
		.pass_summary(PassSummaryRequest {
			data_pass_id: Some(fx.data_pass),
			lhc_period_id: Some(LHC_PERIOD),
			..PassSummaryRequest::default()
		})
		.await
		.expect_err("An LHC period and a pass must be rejected.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");

	fx.cleanup().await;
}
