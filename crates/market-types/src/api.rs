//! HTTP-facing error and pagination types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable machine-readable code, e.g. `INSUFFICIENT_STOCK`.
	pub error: String,
	/// Human-readable description.
	pub message: String,
	/// Additional error context.
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds.
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error with its HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// No usable identity on the request (401).
	Unauthorized { message: String },
	/// Authenticated but not permitted (403).
	Forbidden {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Referenced entity does not exist or is not visible (404).
	NotFound { message: String },
	/// Malformed or invalid input (400).
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// State conflict, possibly retryable (409).
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
		retry_after: Option<u64>,
	},
	/// Unexpected failure (500).
	InternalServerError { message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::Unauthorized { .. } => 401,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::BadRequest { .. } => 400,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::Unauthorized { message } => ("UNAUTHENTICATED", message, None, None),
			APIError::Forbidden {
				error_type,
				message,
				details,
			}
			| APIError::BadRequest {
				error_type,
				message,
				details,
			} => (error_type.as_str(), message, details.clone(), None),
			APIError::NotFound { message } => ("NOT_FOUND", message, None, None),
			APIError::Conflict {
				error_type,
				message,
				details,
				retry_after,
			} => (error_type.as_str(), message, details.clone(), *retry_after),
			APIError::InternalServerError { message } => ("INTERNAL_ERROR", message, None, None),
		};
		ErrorResponse {
			error: error.to_string(),
			message: message.clone(),
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			APIError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
			APIError::NotFound { message } => write!(f, "Not Found: {}", message),
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

/// Page selection for list endpoints.
///
/// Both fields are optional on the wire; [`PageRequest::resolve`] applies the
/// configured default and upper bound.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageRequest {
	pub page: Option<u32>,
	pub limit: Option<u32>,
}

impl PageRequest {
	pub fn new(page: u32, limit: u32) -> Self {
		Self {
			page: Some(page),
			limit: Some(limit),
		}
	}

	/// Returns `(page, limit)` with page ≥ 1 and limit clamped to `1..=max_limit`.
	pub fn resolve(&self, default_limit: u32, max_limit: u32) -> (u32, u32) {
		let page = self.page.unwrap_or(1).max(1);
		let limit = self
			.limit
			.unwrap_or(default_limit)
			.clamp(1, max_limit.max(1));
		(page, limit)
	}
}

/// Pagination metadata returned with every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
	pub page: u32,
	pub limit: u32,
	pub total: u64,
	pub total_pages: u64,
}

impl Pagination {
	pub fn new(page: u32, limit: u32, total: u64) -> Self {
		let limit_u64 = u64::from(limit.max(1));
		Self {
			page,
			limit,
			total,
			total_pages: total.div_ceil(limit_u64),
		}
	}

	/// Index of the first item on this page.
	pub fn offset(&self) -> usize {
		(self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
	}
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
	pub data: Vec<T>,
	pub pagination: Pagination,
}

impl<T> Paginated<T> {
	/// Slices an already-sorted collection down to the requested page.
	pub fn from_sorted(items: Vec<T>, page: u32, limit: u32) -> Self {
		let pagination = Pagination::new(page, limit, items.len() as u64);
		let data = items
			.into_iter()
			.skip(pagination.offset())
			.take(limit as usize)
			.collect();
		Self { data, pagination }
	}
}
