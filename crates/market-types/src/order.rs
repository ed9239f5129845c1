//! Order types for the marketplace.
//!
//! An order is created once from a non-empty cart together with one line per
//! cart entry. Lines freeze the product name and unit price at order time; the
//! order header only changes through its status, payment and delivery fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Address, Money, Product};

/// Lifecycle status of an order.
///
/// The happy path is `Pending -> Confirmed -> Preparing -> Ready -> InDelivery
/// -> Delivered`. `Cancelled` is a side exit; `Delivered` and `Cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	Pending,
	Confirmed,
	Preparing,
	Ready,
	InDelivery,
	Delivered,
	Cancelled,
}

impl OrderStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "PENDING",
			OrderStatus::Confirmed => "CONFIRMED",
			OrderStatus::Preparing => "PREPARING",
			OrderStatus::Ready => "READY",
			OrderStatus::InDelivery => "IN_DELIVERY",
			OrderStatus::Delivered => "DELIVERED",
			OrderStatus::Cancelled => "CANCELLED",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Confirmed,
			Self::Preparing,
			Self::Ready,
			Self::InDelivery,
			Self::Delivered,
			Self::Cancelled,
		]
		.into_iter()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let wanted = s.trim().to_ascii_uppercase();
		Self::all()
			.find(|status| status.as_str() == wanted)
			.ok_or_else(|| format!("Unknown order status: {}", s))
	}
}

/// How the client intends to pay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
	/// Cash on delivery.
	#[default]
	Cod,
	MobileMoney,
	Wallet,
}

/// Payment settlement state. Tracked only; no processor is involved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
	#[default]
	Pending,
	Paid,
	Failed,
	Refunded,
}

/// Order header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	pub id: String,
	/// Human readable number, `PREFIX-YYYYMMDD-RANDOM`.
	pub order_number: String,
	pub user_id: String,
	/// Reference only; the address content is not copied.
	pub address_id: String,
	pub status: OrderStatus,
	pub subtotal: Money,
	pub delivery_fee: Money,
	pub total: Money,
	pub payment_method: PaymentMethod,
	pub payment_status: PaymentStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_person_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// One product entry of an order with name and price frozen at order time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
	pub id: String,
	pub order_id: String,
	pub product_id: String,
	pub product_name: String,
	pub quantity: Decimal,
	pub unit_price: Money,
	pub subtotal: Money,
}

/// Persisted order aggregate. Lines have no lifecycle of their own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredOrder {
	pub order: Order,
	pub lines: Vec<OrderLine>,
}

/// Request to turn the caller's cart into an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	pub address_id: String,
	#[serde(default)]
	pub notes: Option<String>,
	#[serde(default)]
	pub payment_method: Option<PaymentMethod>,
}

/// Body of a status update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
	pub status: OrderStatus,
}

/// Body of a delivery assignment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDeliveryRequest {
	pub delivery_person_id: String,
}

/// Query parameters of order listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
	pub page: Option<u32>,
	pub limit: Option<u32>,
	pub status: Option<OrderStatus>,
}

/// Order line joined with the current product record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
	#[serde(flatten)]
	pub line: OrderLine,
	pub product: Option<Product>,
}

/// Order enriched with its lines, products and delivery address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
	#[serde(flatten)]
	pub order: Order,
	pub items: Vec<OrderItemView>,
	pub address: Option<Address>,
}
