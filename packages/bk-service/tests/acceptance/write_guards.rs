use bk_service::{
	CreateFlagsRequest, DeleteAllForDataPassRequest, DeleteRequest, Error, FlagSpec, VerifyRequest,
};

use super::{Fixture, RUN, admin, at, fixture, fixture_with, member};

fn request(fx: &Fixture, detector_id: i64, flag_type_id: i64) -> CreateFlagsRequest {
	CreateFlagsRequest {
		run_number: RUN,
		detector_id,
		data_pass_id: Some(fx.data_pass),
		simulation_pass_id: None,
		actor: admin(fx.author),
		flags: vec![FlagSpec {
			from: Some(at(9, 0)),
			to: Some(at(10, 0)),
			flag_type_id,
			comment: Some("Low gain.".to_string()),
		}],
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn scope_and_pass_preconditions_are_enforced() {
	let Some(fx) = fixture("scope_and_pass_preconditions_are_enforced").await else {
		return;
	};
	let service = &fx.service;

	let mut frozen = request(&fx, fx.tpc, fx.bad);
	frozen.data_pass_id = Some(fx.frozen_pass);
	let err = service.create_flags(frozen).await.expect_err("Frozen pass must reject flags.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	let mut both = request(&fx, fx.tpc, fx.bad);
	both.simulation_pass_id = Some(1);
	let err = service.create_flags(both).await.expect_err("Two passes must be rejected.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");

	let err = service
		.create_flags(request(&fx, fx.tst, fx.bad))
		.await
		.expect_err("Non-QC detector must be rejected.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");

	let mut missing_run = request(&fx, fx.tpc, fx.bad);
	missing_run.run_number = RUN + 1;
	let err = service.create_flags(missing_run).await.expect_err("Unknown run must be rejected.");

	assert!(matches!(err, Error::NotFound { .. }), "Unexpected error: {err:?}");

	let err = service
		.create_flags(request(&fx, fx.tpc, fx.archived))
		.await
		.expect_err("Archived flag type must be rejected.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");

	let mut foreign = request(&fx, fx.tpc, fx.bad);
	foreign.actor = member(fx.author, "ITS");
	let err = service.create_flags(foreign).await.expect_err("Other detector roles must not write.");

	assert!(matches!(err, Error::AccessDenied { .. }), "Unexpected error: {err:?}");

	let mut own = request(&fx, fx.tpc, fx.bad);
	own.actor = member(fx.author, "TPC");

	assert_eq!(service.create_flags(own).await.expect("Detector role must write.").len(), 1);

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn verification_and_deletion_rules() {
	let Some(fx) = fixture("verification_and_deletion_rules").await else {
		return;
	};
	let service = &fx.service;
	let verified = fx.flag(fx.tpc, Some(at(9, 0)), Some(at(10, 0)), fx.bad).await;
	let plain = fx.flag(fx.tpc, Some(at(11, 0)), Some(at(12, 0)), fx.bad).await;
	let err = service
		.verify_flag(VerifyRequest {
			flag_id: verified.flag_id,
			actor: admin(fx.author),
			comment: None,
		})
		.await
		.expect_err("Authors must not verify their own flags.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	let verification = service
		.verify_flag(VerifyRequest {
			flag_id: verified.flag_id,
			actor: member(fx.reviewer, "TPC"),
			comment: Some("Checked.".to_string()),
		})
		.await
		.expect("Failed to verify QC flag.");

	assert_eq!(verification.flag_id, verified.flag_id);
	assert_eq!(verification.created_by, fx.reviewer);

	let err = service
		.delete_flag(DeleteRequest { flag_id: verified.flag_id, actor: admin(fx.author) })
		.await
		.expect_err("Verified flags must not be deleted.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	service
		.delete_flag(DeleteRequest { flag_id: plain.flag_id, actor: admin(fx.author) })
		.await
		.expect("Failed to delete QC flag.");

	let err = service
		.delete_flag(DeleteRequest { flag_id: plain.flag_id, actor: admin(fx.author) })
		.await
		.expect_err("Second deletion must conflict.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	let err = service
		.verify_flag(VerifyRequest { flag_id: plain.flag_id, actor: admin(fx.reviewer), comment: None })
		.await
		.expect_err("Deleted flags must not be verified.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	let err = service
		.delete_flag(DeleteRequest { flag_id: i64::MAX, actor: admin(fx.author) })
		.await
		.expect_err("Unknown flag must not be deleted.");

	assert!(matches!(err, Error::NotFound { .. }), "Unexpected error: {err:?}");

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn data_pass_purge_is_admin_only() {
	let Some(fx) = fixture("data_pass_purge_is_admin_only").await else {
		return;
	};
	let service = &fx.service;
	let first = fx.flag(fx.tpc, Some(at(9, 0)), Some(at(10, 0)), fx.bad).await;

	fx.flag(fx.its, None, None, fx.good).await;

	let err = service
		.delete_all_for_data_pass(DeleteAllForDataPassRequest {
			data_pass_id: fx.data_pass,
			actor: member(fx.author, "TPC"),
		})
		.await
		.expect_err("Detector roles must not purge a pass.");

	assert!(matches!(err, Error::AccessDenied { .. }), "Unexpected error: {err:?}");

	let err = service
		.delete_all_for_data_pass(DeleteAllForDataPassRequest {
			data_pass_id: fx.frozen_pass,
			actor: admin(fx.author),
		})
		.await
		.expect_err("Frozen pass must not be purged.");

	assert!(matches!(err, Error::Conflict { .. }), "Unexpected error: {err:?}");

	let purged = service
		.delete_all_for_data_pass(DeleteAllForDataPassRequest {
			data_pass_id: fx.data_pass,
			actor: admin(fx.author),
		})
		.await
		.expect("Failed to purge data pass.");

	assert_eq!(purged.deleted_flags, 2);
	assert_eq!(purged.scopes.len(), 2);
	assert!(purged.scopes.iter().all(|scope| scope.run_number == RUN));
	assert!(service.check_all_scopes().await.expect("Failed to check scopes.").is_empty());

	let err = service
		.effective_periods(first.flag_id)
		.await
		.expect_err("Purged flags must be gone.");

	assert!(matches!(err, Error::NotFound { .. }), "Unexpected error: {err:?}");

	fx.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn flag_cap_counts_only_accepted_flags() {
	let Some(fx) = fixture_with("flag_cap_counts_only_accepted_flags", |cfg| {
		cfg.qc.max_flags_per_scope = 1;
	})
	.await
	else {
		return;
	};
	let mut mixed = request(&fx, fx.tpc, fx.bad);

	mixed.flags.push(FlagSpec {
		from: Some(at(12, 0)),
		to: Some(at(11, 0)),
		flag_type_id: fx.bad,
		comment: None,
	});

	let created = fx.service.create_flags(mixed).await.expect("Skipped flags must not count.");

	assert_eq!(created.len(), 1);

	let err = fx
		.service
		.create_flags(request(&fx, fx.tpc, fx.bad))
		.await
		.expect_err("A full scope must reject new flags.");

	assert!(matches!(err, Error::BadParameter { .. }), "Unexpected error: {err:?}");
	assert_eq!(
		fx.service.create_flags(request(&fx, fx.its, fx.bad)).await.expect("Other scopes are not capped.").len(),
		1
	);

	fx.cleanup().await;
}
