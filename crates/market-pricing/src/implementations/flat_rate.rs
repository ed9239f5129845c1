//! Flat delivery fee with a free-delivery threshold.
//!
//! The destination city is accepted but not used; every address pays the
//! same fee.

use crate::{DeliveryFeeFactory, DeliveryFeeInterface, DeliveryFeeRegistry, PricingError};
use market_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Money, Schema, ValidationError,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FLAT_FEE: Money = 1000;
pub const DEFAULT_FREE_DELIVERY_THRESHOLD: Money = 20000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRateConfig {
	#[serde(default = "default_flat_fee")]
	pub flat_fee: Money,
	/// Subtotals at or above this amount ship for free.
	#[serde(default = "default_threshold")]
	pub free_delivery_threshold: Money,
}

fn default_flat_fee() -> Money {
	DEFAULT_FLAT_FEE
}

fn default_threshold() -> Money {
	DEFAULT_FREE_DELIVERY_THRESHOLD
}

pub struct FlatRateFee {
	flat_fee: Money,
	free_delivery_threshold: Money,
}

impl FlatRateFee {
	pub fn new(flat_fee: Money, free_delivery_threshold: Money) -> Self {
		Self {
			flat_fee,
			free_delivery_threshold,
		}
	}
}

impl Default for FlatRateFee {
	fn default() -> Self {
		Self::new(DEFAULT_FLAT_FEE, DEFAULT_FREE_DELIVERY_THRESHOLD)
	}
}

impl DeliveryFeeInterface for FlatRateFee {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FlatRateSchema)
	}

	fn delivery_fee(&self, subtotal: Money, _city: &str) -> Money {
		if subtotal >= self.free_delivery_threshold {
			0
		} else {
			self.flat_fee
		}
	}
}

pub struct FlatRateSchema;

impl ConfigSchema for FlatRateSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let non_negative = || FieldType::Integer {
			min: Some(0),
			max: None,
		};
		Schema::new(
			vec![],
			vec![
				Field::new("flat_fee", non_negative()),
				Field::new("free_delivery_threshold", non_negative()),
			],
		)
		.validate(config)
	}
}

pub fn create_fee_calculator(
	config: &toml::Value,
) -> Result<Box<dyn DeliveryFeeInterface>, PricingError> {
	FlatRateSchema
		.validate(config)
		.map_err(|e| PricingError::Configuration(e.to_string()))?;

	let settings: FlatRateConfig = config
		.clone()
		.try_into()
		.map_err(|e| PricingError::Configuration(format!("Invalid flat_rate config: {}", e)))?;

	Ok(Box::new(FlatRateFee::new(
		settings.flat_fee,
		settings.free_delivery_threshold,
	)))
}

/// Registry entry for the flat-rate calculator.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "flat_rate";
	type Factory = DeliveryFeeFactory;

	fn factory() -> Self::Factory {
		create_fee_calculator
	}
}

impl DeliveryFeeRegistry for Registry {}
