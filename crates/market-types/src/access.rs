//! Actor identity as handed to the engine by the identity collaborator.
//!
//! Credentials are never checked here: an `Actor` is already authenticated,
//! the engine only applies authorization rules on top of it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role carried by every authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
	Client,
	Producer,
	Delivery,
	Admin,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Client => "CLIENT",
			Role::Producer => "PRODUCER",
			Role::Delivery => "DELIVERY",
			Role::Admin => "ADMIN",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_uppercase().as_str() {
			"CLIENT" => Ok(Role::Client),
			"PRODUCER" => Ok(Role::Producer),
			"DELIVERY" => Ok(Role::Delivery),
			"ADMIN" => Ok(Role::Admin),
			other => Err(format!("Unknown role: {}", other)),
		}
	}
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub id: String,
	pub role: Role,
}

impl Actor {
	pub fn new(id: impl Into<String>, role: Role) -> Self {
		Self {
			id: id.into(),
			role,
		}
	}

	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}
}
