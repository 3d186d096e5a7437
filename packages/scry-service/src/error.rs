pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Rate limit exceeded. Retry in {retry_after_secs} seconds.")]
	RateLimited { retry_after_secs: u64 },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<scry_storage::Error> for Error {
	fn from(err: scry_storage::Error) -> Self {
		match err {
			scry_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			scry_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
		}
	}
}

impl From<scry_providers::Error> for Error {
	fn from(err: scry_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
