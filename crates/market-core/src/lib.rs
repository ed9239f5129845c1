//! Core engine of the marketplace.
//!
//! The engine owns the catalog, carts, address books and orders. Its central
//! job is turning a cart into an order without ever overselling stock, and
//! then moving that order through a role-gated lifecycle in which
//! cancellation gives the stock back.
//!
//! Every mutation runs inside a single [`market_storage::StorageTransaction`],
//! which holds the store-wide writer lock from the first read to the commit.
//! Stock checks, decrements, cart merges and status transitions are therefore
//! serialized and either fully applied or not at all.

pub mod access;
pub mod addresses;
pub mod builder;
pub mod cart;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod orders;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use addresses::AddressBook;
pub use builder::{BuilderError, MarketBuilder, MarketFactories};
pub use cart::CartService;
pub use catalog::CatalogService;
pub use engine::MarketEngine;
pub use error::MarketError;
pub use orders::OrderService;

/// Default and maximum page sizes for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
	pub default_limit: u32,
	pub max_limit: u32,
}

impl PageLimits {
	pub fn new(default_limit: u32, max_limit: u32) -> Self {
		Self {
			default_limit,
			max_limit,
		}
	}

	/// Applies the limits to a caller supplied page request.
	pub fn resolve(&self, request: &market_types::PageRequest) -> (u32, u32) {
		request.resolve(self.default_limit, self.max_limit)
	}
}

impl Default for PageLimits {
	fn default() -> Self {
		Self::new(20, 100)
	}
}
