//! HTTP handlers, one module per resource.

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod orders;

use serde::Serialize;

/// Body returned by endpoints that only acknowledge success.
#[derive(Debug, Serialize)]
pub struct Ack {
	pub success: bool,
	pub message: &'static str,
}

impl Ack {
	pub fn new(message: &'static str) -> Self {
		Self {
			success: true,
			message,
		}
	}
}
