//! Delivery addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A delivery address. At most one address per user is the default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
	pub id: String,
	pub user_id: String,
	pub label: String,
	pub full_address: String,
	pub city: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quarter: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub latitude: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub longitude: Option<f64>,
	pub is_default: bool,
	pub created_at: DateTime<Utc>,
}

/// Input for creating an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
	pub label: String,
	pub full_address: String,
	pub city: String,
	#[serde(default)]
	pub quarter: Option<String>,
	#[serde(default)]
	pub latitude: Option<f64>,
	#[serde(default)]
	pub longitude: Option<f64>,
	#[serde(default)]
	pub is_default: bool,
}

/// Partial address update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPatch {
	pub label: Option<String>,
	pub full_address: Option<String>,
	pub city: Option<String>,
	pub quarter: Option<String>,
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
	pub is_default: Option<bool>,
}
