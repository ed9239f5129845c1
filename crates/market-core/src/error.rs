//! Error taxonomy of the engine.

use market_pricing::PricingError;
use market_storage::StorageError;
use market_types::{APIError, OrderStatus};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Errors returned by engine operations.
///
/// Each variant has a stable code (see [`MarketError::code`]) that clients can
/// branch on. The engine never retries on its own; `Conflict` is safe for the
/// caller to retry.
#[derive(Debug, Error)]
pub enum MarketError {
	#[error("Authentication required")]
	Unauthenticated,
	#[error("Forbidden: {0}")]
	Forbidden(String),
	/// Absent, or not visible to the caller.
	#[error("{0} not found")]
	NotFound(String),
	#[error("Validation failed: {0}")]
	ValidationFailed(String),
	#[error("Cart is empty")]
	EmptyCart,
	#[error("Insufficient stock for {product}: {available} available")]
	InsufficientStock { product: String, available: Decimal },
	#[error("Transition from {from} to {to} is not allowed")]
	ForbiddenTransition { from: OrderStatus, to: OrderStatus },
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Internal error: {0}")]
	Internal(String),
}

impl MarketError {
	/// Stable machine-readable code.
	pub fn code(&self) -> &'static str {
		match self {
			MarketError::Unauthenticated => "UNAUTHENTICATED",
			MarketError::Forbidden(_) => "FORBIDDEN",
			MarketError::NotFound(_) => "NOT_FOUND",
			MarketError::ValidationFailed(_) => "VALIDATION_FAILED",
			MarketError::EmptyCart => "EMPTY_CART",
			MarketError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
			MarketError::ForbiddenTransition { .. } => "FORBIDDEN_TRANSITION",
			MarketError::Conflict(_) => "CONFLICT",
			MarketError::Storage(_) | MarketError::Internal(_) => "INTERNAL_ERROR",
		}
	}

	pub(crate) fn not_found(what: impl Into<String>) -> Self {
		MarketError::NotFound(what.into())
	}

	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		MarketError::ValidationFailed(message.into())
	}
}

impl From<StorageError> for MarketError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::Timeout(waited) => MarketError::Conflict(format!(
				"store busy, writer lock not acquired within {:?}",
				waited
			)),
			StorageError::NotFound => MarketError::not_found("Record"),
			other => MarketError::Storage(other.to_string()),
		}
	}
}

impl From<PricingError> for MarketError {
	fn from(err: PricingError) -> Self {
		match err {
			PricingError::Overflow(what) => {
				MarketError::invalid(format!("amount out of range: {}", what))
			},
			PricingError::InvalidQuantity(q) => MarketError::invalid(format!("invalid quantity {}", q)),
			PricingError::Configuration(msg) => MarketError::Internal(msg),
		}
	}
}

impl From<MarketError> for APIError {
	fn from(err: MarketError) -> Self {
		let error_type = err.code().to_string();
		let message = err.to_string();
		match err {
			MarketError::Unauthenticated => APIError::Unauthorized { message },
			MarketError::Forbidden(_) => APIError::Forbidden {
				error_type,
				message,
				details: None,
			},
			MarketError::ForbiddenTransition { from, to } => APIError::Forbidden {
				error_type,
				message,
				details: Some(json!({ "from": from, "to": to })),
			},
			MarketError::NotFound(_) => APIError::NotFound { message },
			MarketError::ValidationFailed(_) | MarketError::EmptyCart => APIError::BadRequest {
				error_type,
				message,
				details: None,
			},
			MarketError::InsufficientStock { product, available } => APIError::Conflict {
				error_type,
				message,
				details: Some(json!({ "product": product, "available": available })),
				retry_after: None,
			},
			MarketError::Conflict(_) => APIError::Conflict {
				error_type,
				message,
				details: None,
				retry_after: Some(1),
			},
			MarketError::Storage(_) | MarketError::Internal(_) => {
				tracing::error!(error = %message, "internal failure");
				APIError::InternalServerError {
					message: "An internal error occurred".to_string(),
				}
			},
		}
	}
}
