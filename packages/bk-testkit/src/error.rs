pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("BK_PG_DSN is not a valid Postgres DSN: {0}")]
	InvalidDsn(#[source] sqlx::Error),

	#[error("Failed to start the cleanup runtime: {0}")]
	Runtime(#[from] std::io::Error),

	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
