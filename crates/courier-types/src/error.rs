//! Error type shared by every Courier crate

use axum::{Json, http::StatusCode, response::IntoResponse};

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	Unauthorized,
	DbError,
	Parse,

	ValidationError(String),
	ConfigError(String),
	/// Template or parameter problem while producing a message body
	Render(String),
	/// The mail transport refused or failed to deliver
	Transport(String),
	ServiceUnavailable(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	/// Text recorded in the queue when a delivery attempt fails
	///
	/// Render and transport failures keep their message verbatim so operators
	/// see what the remote side said.
	pub fn failure_text(&self) -> String {
		match self {
			Error::Render(msg) | Error::Transport(msg) => msg.clone(),
			err => err.to_string(),
		}
	}

	fn status_and_code(&self) -> (StatusCode, &'static str) {
		match self {
			Error::NotFound => (StatusCode::NOT_FOUND, "E-NOT-FOUND"),
			Error::Unauthorized => (StatusCode::UNAUTHORIZED, "E-UNAUTHORIZED"),
			Error::ValidationError(_) => (StatusCode::BAD_REQUEST, "E-VALIDATION"),
			Error::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "E-UNAVAILABLE"),
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "E-INTERNAL"),
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::warn!("JSON: {}", err);
		Self::Parse
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::Unauthorized => write!(f, "unauthorized"),
			Error::DbError => write!(f, "database error"),
			Error::Parse => write!(f, "parse error"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Render(msg) => write!(f, "render error: {}", msg),
			Error::Transport(msg) => write!(f, "transport error: {}", msg),
			Error::ServiceUnavailable(msg) => write!(f, "service unavailable: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, code) = self.status_and_code();
		// Internal details stay in the logs
		let message = match &self {
			Error::ValidationError(msg) => msg.clone(),
			Error::NotFound | Error::Unauthorized => self.to_string(),
			_ => {
				tracing::warn!("Request failed: {}", self);
				"Internal server error".to_string()
			}
		};
		let body = serde_json::json!({
			"error": {
				"code": code,
				"message": message,
			}
		});
		(status, Json(body)).into_response()
	}
}


// vim: ts=4
