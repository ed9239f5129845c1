//! Catalog records: categories, products and product images.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Money;

/// Unit a product is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductUnit {
	Kg,
	Gram,
	Unit,
	Liter,
	/// A heap sold by the pile at market stalls.
	Tas,
	Bunch,
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
	pub id: String,
	pub name: String,
	pub slug: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parent_id: Option<String>,
	pub is_active: bool,
	pub sort_order: i32,
}

/// Image attached to a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
	pub id: String,
	pub url: String,
	pub is_primary: bool,
}

/// A sellable product.
///
/// `stock` is expressed in `unit` and never drops below zero. It is only
/// mutated by order creation, order cancellation and explicit producer edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
	pub id: String,
	pub producer_id: String,
	pub category_id: String,
	pub name: String,
	#[serde(default)]
	pub description: String,
	/// Price per unit in minor currency units.
	pub price: Money,
	pub unit: ProductUnit,
	pub stock: Decimal,
	pub min_quantity: Decimal,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub origin: Option<String>,
	pub is_active: bool,
	#[serde(default)]
	pub images: Vec<ProductImage>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Product {
	/// Whether `quantity` can be served from current stock.
	pub fn has_stock_for(&self, quantity: Decimal) -> bool {
		self.stock >= quantity
	}
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
	pub category_id: String,
	pub name: String,
	#[serde(default)]
	pub description: String,
	pub price: Money,
	pub unit: ProductUnit,
	pub stock: Decimal,
	#[serde(default)]
	pub min_quantity: Option<Decimal>,
	#[serde(default)]
	pub origin: Option<String>,
}

/// Partial product update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
	pub name: Option<String>,
	pub description: Option<String>,
	pub price: Option<Money>,
	pub unit: Option<ProductUnit>,
	pub category_id: Option<String>,
	pub stock: Option<Decimal>,
	pub min_quantity: Option<Decimal>,
	pub origin: Option<String>,
	pub is_active: Option<bool>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
	pub name: String,
	#[serde(default)]
	pub icon: Option<String>,
	#[serde(default)]
	pub parent_id: Option<String>,
	#[serde(default)]
	pub sort_order: i32,
}

/// Filter for catalog listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
	pub category_id: Option<String>,
	pub producer_id: Option<String>,
	/// Case-insensitive substring match on the product name.
	pub search: Option<String>,
	/// Also return deactivated products. Honoured only for the owning
	/// producer or an admin.
	#[serde(default)]
	pub include_inactive: bool,
}
