//! Cooldown error type

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownError {
	/// An attempt counter is exhausted
	Throttled {
		/// Purpose of the counter that denied the attempt
		purpose: &'static str,
		/// Time until the counter expires
		retry_after: Duration,
	},
}

impl CooldownError {
	pub fn retry_after(&self) -> Duration {
		match self {
			CooldownError::Throttled { retry_after, .. } => *retry_after,
		}
	}
}

impl std::fmt::Display for CooldownError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CooldownError::Throttled { purpose, retry_after } => {
				write!(f, "Cooldown active for {}, retry after {:?}", purpose, retry_after)
			}
		}
	}
}

impl std::error::Error for CooldownError {}

impl IntoResponse for CooldownError {
	fn into_response(self) -> Response {
		match self {
			CooldownError::Throttled { purpose, retry_after } => {
				let retry_secs = retry_after.as_secs();
				let body = serde_json::json!({
					"error": {
						"code": "E-RATE-LIMITED",
						"message": "Too many attempts. Please try again later.",
						"details": {
							"purpose": purpose,
							"retryAfter": retry_secs
						}
					}
				});

				let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
				if let Ok(val) = retry_secs.to_string().parse() {
					response.headers_mut().insert("Retry-After", val);
				}
				response
			}
		}
	}
}


// vim: ts=4
