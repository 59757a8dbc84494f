use serde::{Deserialize, Serialize};

use bk_domain::{effective, flag::Scope};
use bk_storage::queries;

use crate::{QcService, Result, scope};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecomputeReport {
	pub scope: Scope,
	pub periods: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScopeViolation {
	pub scope: Scope,
	pub message: String,
}

impl QcService {
	/// Rebuilds the effective periods of one scope from its flags.
	pub async fn recompute_scope(&self, scope: Scope) -> Result<RecomputeReport> {
		let mut tx = self.db.pool.begin().await?;

		queries::lock_scope(&mut tx, &scope).await?;

		let periods = self.recompute_locked(&mut tx, &scope).await?;

		tx.commit().await?;

		Ok(RecomputeReport { scope, periods: periods.len() })
	}

	/// Rebuilds every scope, one transaction per scope.
	pub async fn recompute_all(&self) -> Result<Vec<RecomputeReport>> {
		let scopes = queries::all_scopes(&self.db.pool).await?;
		let mut reports = Vec::with_capacity(scopes.len());

		for key in scopes {
			reports.push(self.recompute_scope(key.scope()).await?);
		}

		tracing::info!(scopes = reports.len(), "Recomputed all effective periods.");

		Ok(reports)
	}

	/// Checks stored effective periods of every scope and reports the scopes that are off.
	pub async fn check_all_scopes(&self) -> Result<Vec<ScopeViolation>> {
		let mut tx = self.db.begin_snapshot().await?;
		let mut violations = Vec::new();

		for key in queries::all_scopes(&mut *tx).await? {
			let scope = key.scope();
			let flags: Vec<_> = queries::load_scope_flags(&mut *tx, &scope)
				.await?
				.iter()
				.map(scope::scoped_flag)
				.collect();
			let periods: Vec<_> = queries::load_scope_periods(&mut *tx, &scope)
				.await?
				.iter()
				.map(|row| effective::EffectivePeriod { flag_id: row.flag_id, interval: row.interval() })
				.collect();

			if let Err(violation) = effective::check_scope_invariants(&flags, &periods) {
				tracing::warn!(
					run_number = scope.run_number,
					detector_id = scope.detector_id,
					pass = %scope.pass,
					%violation,
					"Effective periods violate scope invariants."
				);

				violations.push(ScopeViolation { scope, message: violation.to_string() });
			}
		}

		tx.commit().await?;

		Ok(violations)
	}
}
