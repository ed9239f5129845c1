//! Cart lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Money, Product};

/// One (user, product) entry of a cart. The pair is unique per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
	pub id: String,
	pub user_id: String,
	pub product_id: String,
	pub quantity: Decimal,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Cart line joined with the current product record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
	pub id: String,
	pub product_id: String,
	pub quantity: Decimal,
	/// `None` when the product no longer exists.
	pub product: Option<Product>,
	/// `quantity × current price`; zero when the product is gone.
	pub line_subtotal: Money,
}

/// A user's cart with live prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
	pub items: Vec<CartItemView>,
	pub subtotal: Money,
	/// Number of distinct lines.
	pub item_count: usize,
}

/// Body of an add-to-cart request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItem {
	pub product_id: String,
	pub quantity: Decimal,
}
