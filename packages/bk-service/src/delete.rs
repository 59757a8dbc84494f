use serde::{Deserialize, Serialize};

use bk_domain::{
	access::{self, Actor},
	effective::EffectivePeriod,
	flag::Scope,
};
use bk_storage::{models::ScopeKey, queries};

use crate::{Error, QcService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
	pub flag_id: i64,
	pub actor: Actor,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
	pub flag_id: i64,
	pub scope: Scope,
	/// Effective periods of the scope after the deletion.
	pub effective_periods: Vec<EffectivePeriod>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteAllForDataPassRequest {
	pub data_pass_id: i64,
	pub actor: Actor,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteAllForDataPassResponse {
	pub data_pass_id: i64,
	/// Scopes emptied by the purge.
	pub scopes: Vec<Scope>,
	pub deleted_flags: u64,
}

impl QcService {
	pub async fn delete_flag(&self, req: DeleteRequest) -> Result<DeleteResponse> {
		let mut tx = self.db.pool.begin().await?;
		let flag = queries::fetch_flag(&mut *tx, req.flag_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("QC flag {} not found.", req.flag_id)))?;
		let resolved =
			self.resolve_scope(&mut tx, flag.run_number, flag.detector_id, flag.pass()).await?;
		let scope = resolved.scope;

		queries::lock_scope(&mut tx, &scope).await?;

		let flag = queries::fetch_flag_for_update(&mut tx, req.flag_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("QC flag {} not found.", req.flag_id)))?;

		if flag.deleted {
			return Err(Error::conflict(format!("QC flag {} is already deleted.", flag.id)));
		}
		if resolved.frozen {
			return Err(Error::conflict("Data pass is frozen."));
		}
		if self.cfg.qc.reject_delete_verified
			&& !queries::flag_verifications(&mut *tx, flag.id).await?.is_empty()
		{
			return Err(Error::conflict("Cannot delete QC flag which is verified."));
		}

		self.ensure_can_manage(&req.actor, &resolved.detector)?;

		queries::mark_flag_deleted(&mut tx, flag.id).await?;

		let effective_periods = self.recompute_locked(&mut tx, &scope).await?;

		tx.commit().await?;

		tracing::info!(
			flag_id = flag.id,
			run_number = scope.run_number,
			detector_id = scope.detector_id,
			pass = %scope.pass,
			"Deleted QC flag."
		);

		Ok(DeleteResponse { flag_id: flag.id, scope, effective_periods })
	}

	/// Removes every flag of a data pass. Restricted to admin roles.
	pub async fn delete_all_for_data_pass(
		&self,
		req: DeleteAllForDataPassRequest,
	) -> Result<DeleteAllForDataPassResponse> {
		if !access::is_admin(&self.cfg.access, &req.actor.roles) {
			return Err(Error::access_denied("Only admins may delete all flags of a data pass."));
		}

		let mut tx = self.db.pool.begin().await?;
		let data_pass = queries::fetch_data_pass(&mut *tx, req.data_pass_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("Data pass {} not found.", req.data_pass_id)))?;

		if data_pass.frozen {
			return Err(Error::conflict("Data pass is frozen."));
		}

		let scopes: Vec<Scope> = queries::data_pass_flag_scopes(&mut *tx, data_pass.id)
			.await?
			.iter()
			.map(ScopeKey::scope)
			.collect();

		// Locks are taken in listing order.
		for scope in &scopes {
			queries::lock_scope(&mut tx, scope).await?;
		}

		let deleted_flags = queries::delete_data_pass_flags(&mut *tx, data_pass.id).await?;

		tx.commit().await?;

		tracing::info!(
			data_pass_id = data_pass.id,
			scopes = scopes.len(),
			deleted_flags,
			"Deleted all QC flags of data pass."
		);

		Ok(DeleteAllForDataPassResponse {
			data_pass_id: data_pass.id,
			scopes,
			deleted_flags,
		})
	}
}
