//! Assembles a [`MarketEngine`] from configuration and factory functions.
//!
//! Storage and pricing are pluggable: the caller hands in one factory per
//! implementation name and the builder instantiates those listed in the
//! configuration.

use crate::orders::OrderNumbering;
use crate::{MarketEngine, PageLimits};
use market_config::Config;
use market_pricing::{DeliveryFeeInterface, PricingError, PricingService};
use market_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling the engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for each pluggable component, keyed by implementation
/// name.
pub struct MarketFactories<SF, PF> {
	pub storage_factories: HashMap<String, SF>,
	pub pricing_factories: HashMap<String, PF>,
}

pub struct MarketBuilder {
	config: Config,
}

impl MarketBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build<SF, PF>(
		self,
		factories: MarketFactories<SF, PF>,
	) -> Result<MarketEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		PF: Fn(&toml::Value) -> Result<Box<dyn DeliveryFeeInterface>, PricingError>,
	{
		// Only the primary backend is opened: file backends hold an exclusive
		// lock on their directory.
		let primary_storage = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary_storage
				))
			})?;
		let storage_factory = factories
			.storage_factories
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage factory '{}'", primary_storage))
			})?;
		let backend = storage_factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary_storage,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary_storage, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %primary_storage, enabled = true, "Loaded");
		let storage = Arc::new(
			StorageService::new(backend).with_lock_timeout(self.config.lock_timeout()),
		);

		let mut pricing_impls: HashMap<String, Arc<dyn DeliveryFeeInterface>> = HashMap::new();
		for (name, config) in &self.config.pricing.implementations {
			let Some(factory) = factories.pricing_factories.get(name) else {
				tracing::warn!(component = "pricing", implementation = %name, "No factory registered, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					let is_primary = &self.config.pricing.primary == name;
					tracing::info!(component = "pricing", implementation = %name, enabled = %is_primary, "Loaded");
					pricing_impls.insert(name.clone(), Arc::from(implementation));
				},
				Err(e) => {
					tracing::error!(
						component = "pricing",
						implementation = %name,
						error = %e,
						"Failed to create pricing implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create pricing implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if pricing_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid pricing implementations available".into(),
			));
		}
		let pricing = PricingService::new(pricing_impls, self.config.pricing.primary.clone())
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		let orders = &self.config.orders;
		let limits = PageLimits::new(orders.default_page_size, orders.max_page_size);
		let numbering = OrderNumbering::new(orders.number_prefix.clone(), orders.number_attempts);

		tracing::info!(market = %self.config.market.id, "Market engine assembled");
		Ok(MarketEngine::new(
			storage,
			Arc::new(pricing),
			limits,
			numbering,
		))
	}
}
