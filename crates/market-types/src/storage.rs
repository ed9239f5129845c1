//! Storage namespaces for the marketplace.

use std::str::FromStr;

/// Storage namespaces for the persisted collections.
///
/// Keys are built as `namespace:id`; using the enum instead of string
/// literals keeps every caller on the same spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Products, keyed by product id.
	Products,
	/// Categories, keyed by category id.
	Categories,
	/// One cart document per user, keyed by user id.
	Carts,
	/// One address book per user, keyed by user id.
	Addresses,
	/// Order aggregates (header + lines), keyed by order id.
	Orders,
	/// Order number to order id, keyed by order number.
	OrderNumbers,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Products => "products",
			StorageKey::Categories => "categories",
			StorageKey::Carts => "carts",
			StorageKey::Addresses => "addresses",
			StorageKey::Orders => "orders",
			StorageKey::OrderNumbers => "order_numbers",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Products,
			Self::Categories,
			Self::Carts,
			Self::Addresses,
			Self::Orders,
			Self::OrderNumbers,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
