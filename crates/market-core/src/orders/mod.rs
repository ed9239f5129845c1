//! Order engine.
//!
//! [`OrderService`] turns carts into orders, drives their lifecycle and
//! answers order queries. Operations are split across submodules:
//! creation in `create`, transitions and delivery assignment in `status`,
//! listings in `query` and response enrichment in `enrich`.

mod create;
mod enrich;
pub mod number;
mod query;
mod status;

pub use number::{generate_order_number, OrderNumbering};

use crate::{AddressBook, CartService, CatalogService, PageLimits};
use market_pricing::PricingService;
use market_storage::StorageService;
use std::sync::Arc;

pub struct OrderService {
	storage: Arc<StorageService>,
	catalog: Arc<CatalogService>,
	carts: Arc<CartService>,
	addresses: Arc<AddressBook>,
	pricing: Arc<PricingService>,
	limits: PageLimits,
	numbering: OrderNumbering,
}

impl OrderService {
	pub fn new(
		storage: Arc<StorageService>,
		catalog: Arc<CatalogService>,
		carts: Arc<CartService>,
		addresses: Arc<AddressBook>,
		pricing: Arc<PricingService>,
		limits: PageLimits,
		numbering: OrderNumbering,
	) -> Self {
		Self {
			storage,
			catalog,
			carts,
			addresses,
			pricing,
			limits,
			numbering,
		}
	}
}
