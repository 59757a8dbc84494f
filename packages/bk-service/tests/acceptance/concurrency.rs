use std::sync::Arc;

use bk_service::{CreateFlagsRequest, FlagSpec};

use super::{RUN, admin, at, fixture_with};

const WRITERS: i64 = 24;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires external Postgres. Set BK_PG_DSN to run."]
async fn concurrent_creates_leave_the_scope_consistent() {
	let Some(fx) = fixture_with("concurrent_creates_leave_the_scope_consistent", |cfg| {
		cfg.storage.postgres.pool_max_conns = 8;
	})
	.await
	else {
		return;
	};
	let mut writers = Vec::with_capacity(WRITERS as usize);

	for writer in 0..WRITERS {
		let service = Arc::clone(&fx.service);
		// Staggered half-hour flags overlap their neighbours.
		let from = at(8, 0) + time::Duration::minutes(writer * 20);
		let req = CreateFlagsRequest {
			run_number: RUN,
			detector_id: fx.tpc,
			data_pass_id: Some(fx.data_pass),
			simulation_pass_id: None,
			actor: admin(fx.author),
			flags: vec![FlagSpec {
				from: Some(from),
				to: Some(from + time::Duration::minutes(30)),
				flag_type_id: fx.bad,
				comment: Some(format!("Writer {writer}.")),
			}],
		};

		writers.push(tokio::spawn(async move { service.create_flags(req).await }));
	}

	let mut created = 0;

	for writer in writers {
		created += writer
			.await
			.expect("Writer task panicked.")
			.expect("Failed to create QC flag.")
			.len();
	}

	assert_eq!(created, WRITERS as usize);
	assert!(fx.service.check_all_scopes().await.expect("Failed to check scopes.").is_empty());

	let reports = fx.service.recompute_all().await.expect("Failed to recompute scopes.");

	assert_eq!(reports.len(), 1);

	fx.cleanup().await;
}
