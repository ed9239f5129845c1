//! Order pricing.
//!
//! Line subtotals are computed here so every caller rounds the same way, and
//! the delivery fee comes from a pluggable [`DeliveryFeeInterface`]
//! implementation selected by configuration.

use market_types::{ConfigSchema, ImplementationRegistry, Money};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod flat_rate;
}

/// Errors that can occur while pricing an order.
#[derive(Debug, Error)]
pub enum PricingError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// An amount does not fit in the currency representation.
	#[error("Amount overflow: {0}")]
	Overflow(String),
	#[error("Invalid quantity: {0}")]
	InvalidQuantity(String),
}

/// Computes the delivery fee for an order.
pub trait DeliveryFeeInterface: Send + Sync {
	/// Returns the configuration schema for this calculator.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fee for delivering an order with the given subtotal to `city`.
	fn delivery_fee(&self, subtotal: Money, city: &str) -> Money;
}

/// Builds a calculator from its `[pricing.implementations.<name>]` table.
pub type DeliveryFeeFactory =
	fn(&toml::Value) -> Result<Box<dyn DeliveryFeeInterface>, PricingError>;

/// Registry trait for fee calculators.
pub trait DeliveryFeeRegistry: ImplementationRegistry<Factory = DeliveryFeeFactory> {}

/// Get all registered fee calculator implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFeeFactory)> {
	use implementations::flat_rate;

	vec![(flat_rate::Registry::NAME, flat_rate::Registry::factory())]
}

/// Subtotal, fee and total of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
	pub subtotal: Money,
	pub delivery_fee: Money,
	pub total: Money,
}

/// `quantity × unit_price`, rounded half away from zero to whole minor units.
pub fn line_subtotal(quantity: Decimal, unit_price: Money) -> Result<Money, PricingError> {
	if quantity.is_sign_negative() {
		return Err(PricingError::InvalidQuantity(quantity.to_string()));
	}
	quantity
		.checked_mul(Decimal::from(unit_price))
		.map(|amount| amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
		.and_then(|amount| amount.to_i64())
		.ok_or_else(|| PricingError::Overflow(format!("{} x {}", quantity, unit_price)))
}

/// Selects the configured fee calculator and derives order totals.
pub struct PricingService {
	implementations: HashMap<String, Arc<dyn DeliveryFeeInterface>>,
	primary: String,
}

impl PricingService {
	pub fn new(
		implementations: HashMap<String, Arc<dyn DeliveryFeeInterface>>,
		primary: String,
	) -> Result<Self, PricingError> {
		if !implementations.contains_key(&primary) {
			return Err(PricingError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary
			)));
		}
		Ok(Self {
			implementations,
			primary,
		})
	}

	/// Convenience constructor around a single calculator.
	pub fn single(name: impl Into<String>, calculator: Arc<dyn DeliveryFeeInterface>) -> Self {
		let name = name.into();
		Self {
			implementations: HashMap::from([(name.clone(), calculator)]),
			primary: name,
		}
	}

	fn calculator(&self) -> Result<&Arc<dyn DeliveryFeeInterface>, PricingError> {
		self.implementations.get(&self.primary).ok_or_else(|| {
			PricingError::Configuration(format!(
				"Primary implementation '{}' not available",
				self.primary
			))
		})
	}

	/// Delivery fee from the primary calculator.
	pub fn delivery_fee(&self, subtotal: Money, city: &str) -> Result<Money, PricingError> {
		Ok(self.calculator()?.delivery_fee(subtotal, city))
	}

	/// Sums the line subtotals and adds the delivery fee.
	pub fn breakdown(
		&self,
		line_subtotals: impl IntoIterator<Item = Money>,
		city: &str,
	) -> Result<PriceBreakdown, PricingError> {
		let subtotal = line_subtotals
			.into_iter()
			.try_fold(0i64, |acc, line| acc.checked_add(line))
			.ok_or_else(|| PricingError::Overflow("order subtotal".into()))?;
		let delivery_fee = self.delivery_fee(subtotal, city)?;
		let total = subtotal
			.checked_add(delivery_fee)
			.ok_or_else(|| PricingError::Overflow("order total".into()))?;
		Ok(PriceBreakdown {
			subtotal,
			delivery_fee,
			total,
		})
	}
}
