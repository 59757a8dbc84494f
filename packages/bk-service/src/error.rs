pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Bad parameter: {message}")]
	BadParameter { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Access denied: {message}")]
	AccessDenied { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub(crate) fn not_found(message: impl Into<String>) -> Self {
		Self::NotFound { message: message.into() }
	}

	pub(crate) fn bad_parameter(message: impl Into<String>) -> Self {
		Self::BadParameter { message: message.into() }
	}

	pub(crate) fn conflict(message: impl Into<String>) -> Self {
		Self::Conflict { message: message.into() }
	}

	pub(crate) fn access_denied(message: impl Into<String>) -> Self {
		Self::AccessDenied { message: message.into() }
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
impl From<bk_storage::Error> for Error {
	fn from(err: bk_storage::Error) -> Self {
		match err {
			bk_storage::Error::Sqlx(inner) => Self::from(inner),
		}
	}
}
