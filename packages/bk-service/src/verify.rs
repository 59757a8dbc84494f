use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, serde::rfc3339};

use bk_domain::access::Actor;
use bk_storage::queries;

use crate::{Error, QcService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
	pub flag_id: i64,
	pub actor: Actor,
	#[serde(default)]
	pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
	pub verification_id: i64,
	pub flag_id: i64,
	pub comment: Option<String>,
	pub created_by: i64,
	#[serde(with = "rfc3339")]
	pub created_at: OffsetDateTime,
}

impl QcService {
	pub async fn verify_flag(&self, req: VerifyRequest) -> Result<VerifyResponse> {
		let mut tx = self.db.pool.begin().await?;
		let flag = queries::fetch_flag_for_update(&mut tx, req.flag_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("QC flag {} not found.", req.flag_id)))?;

		if flag.deleted {
			return Err(Error::conflict("Cannot verify a deleted QC flag."));
		}

		let user = self.resolve_user(&mut tx, req.actor.user).await?;

		if user.id == flag.created_by {
			return Err(Error::conflict("Cannot verify a QC flag created by yourself."));
		}

		let detector = queries::fetch_detector(&mut *tx, flag.detector_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("Detector {} not found.", flag.detector_id)))?;

		self.ensure_can_manage(&req.actor, &detector)?;

		let verification = queries::insert_verification(
			&mut *tx,
			flag.id,
			req.comment.as_deref(),
			user.id,
			OffsetDateTime::now_utc(),
		)
		.await?;

		tx.commit().await?;

		tracing::info!(flag_id = flag.id, user_id = user.id, "Verified QC flag.");

		Ok(VerifyResponse {
			verification_id: verification.id,
			flag_id: verification.flag_id,
			comment: verification.comment,
			created_by: verification.created_by,
			created_at: verification.created_at,
		})
	}
}
