//! Marketplace engine tying the catalog, carts, address books and orders
//! together over one shared store.

use crate::orders::OrderNumbering;
use crate::{AddressBook, CartService, CatalogService, OrderService, PageLimits};
use market_pricing::PricingService;
use market_storage::StorageService;
use std::sync::Arc;

/// Entry point used by the HTTP surface and by tests.
#[derive(Clone)]
pub struct MarketEngine {
	/// Shared store; all services serialize their writes through it.
	storage: Arc<StorageService>,
	pricing: Arc<PricingService>,
	catalog: Arc<CatalogService>,
	carts: Arc<CartService>,
	addresses: Arc<AddressBook>,
	orders: Arc<OrderService>,
}

impl MarketEngine {
	pub fn new(
		storage: Arc<StorageService>,
		pricing: Arc<PricingService>,
		limits: PageLimits,
		numbering: OrderNumbering,
	) -> Self {
		let catalog = Arc::new(CatalogService::new(storage.clone(), limits));
		let carts = Arc::new(CartService::new(storage.clone(), catalog.clone()));
		let addresses = Arc::new(AddressBook::new(storage.clone()));
		let orders = Arc::new(OrderService::new(
			storage.clone(),
			catalog.clone(),
			carts.clone(),
			addresses.clone(),
			pricing.clone(),
			limits,
			numbering,
		));

		Self {
			storage,
			pricing,
			catalog,
			carts,
			addresses,
			orders,
		}
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn pricing(&self) -> &Arc<PricingService> {
		&self.pricing
	}

	pub fn catalog(&self) -> &Arc<CatalogService> {
		&self.catalog
	}

	pub fn carts(&self) -> &Arc<CartService> {
		&self.carts
	}

	pub fn addresses(&self) -> &Arc<AddressBook> {
		&self.addresses
	}

	pub fn orders(&self) -> &Arc<OrderService> {
		&self.orders
	}
}
