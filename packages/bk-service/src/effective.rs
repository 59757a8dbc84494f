use bk_domain::interval::Interval;
use bk_storage::queries;

use crate::{Error, QcService, Result};

impl QcService {
	/// Current effective periods of a flag in time order. Deleted flags have none.
	pub async fn effective_periods(&self, flag_id: i64) -> Result<Vec<Interval>> {
		let mut tx = self.db.begin_snapshot().await?;

		if queries::fetch_flag(&mut *tx, flag_id).await?.is_none() {
			return Err(Error::not_found(format!("QC flag {flag_id} not found.")));
		}

		let mut periods: Vec<Interval> = queries::flag_effective_periods(&mut *tx, flag_id)
			.await?
			.iter()
			.map(|period| period.interval())
			.collect();

		tx.commit().await?;
		periods.sort();

		Ok(periods)
	}
}
