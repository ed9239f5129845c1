//! Human-readable order numbers of the form `PREFIX-YYYYMMDD-XXXXXX`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 6;

/// How order numbers are drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumbering {
	pub prefix: String,
	/// Draws attempted before giving up on a collision streak.
	pub attempts: u32,
}

impl OrderNumbering {
	pub fn new(prefix: impl Into<String>, attempts: u32) -> Self {
		Self {
			prefix: prefix.into(),
			attempts: attempts.max(1),
		}
	}

	pub fn generate(&self, now: DateTime<Utc>) -> String {
		generate_order_number(&self.prefix, now)
	}
}

impl Default for OrderNumbering {
	fn default() -> Self {
		Self::new("KIB", 5)
	}
}

/// Draws a fresh order number for `now`'s UTC date.
///
/// The suffix comes from a random v4 UUID, giving 36^6 possibilities per
/// day. Uniqueness is enforced by the caller against the number index.
pub fn generate_order_number(prefix: &str, now: DateTime<Utc>) -> String {
	let mut entropy = Uuid::new_v4().as_u128();
	let mut suffix = String::with_capacity(SUFFIX_LEN);
	for _ in 0..SUFFIX_LEN {
		suffix.push(ALPHABET[(entropy % 36) as usize] as char);
		entropy /= 36;
	}
	format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix)
}
