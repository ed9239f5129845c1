//! Role-gated order state machine.
//!
//! Which statuses an order may move to depends on both its current status and
//! the role of the actor asking. The table is the single source of truth for
//! that decision; nothing else in the crate branches on roles to decide
//! transitions.

use chrono::{DateTime, Utc};
use market_types::{Order, OrderStatus, PaymentStatus, Role};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

type TransitionTable = HashMap<(Role, OrderStatus), HashSet<OrderStatus>>;

static TRANSITIONS: Lazy<TransitionTable> = Lazy::new(|| {
	use market_types::OrderStatus::*;

	let mut m = HashMap::new();

	// Clients may only withdraw an order nobody has acted on yet.
	m.insert((Role::Client, Pending), HashSet::from([Cancelled]));

	m.insert((Role::Producer, Pending), HashSet::from([Preparing]));
	m.insert((Role::Producer, Preparing), HashSet::from([Ready]));
	m.insert((Role::Producer, Ready), HashSet::from([InDelivery]));
	m.insert((Role::Producer, InDelivery), HashSet::from([Delivered]));

	m.insert((Role::Delivery, Ready), HashSet::from([InDelivery]));
	m.insert((Role::Delivery, InDelivery), HashSet::from([Delivered]));

	m.insert((Role::Admin, Pending), HashSet::from([Confirmed, Cancelled]));
	m.insert((Role::Admin, Confirmed), HashSet::from([Preparing, Cancelled]));
	m.insert((Role::Admin, Preparing), HashSet::from([Ready, Cancelled]));
	m.insert((Role::Admin, Ready), HashSet::from([InDelivery, Cancelled]));
	m.insert((Role::Admin, InDelivery), HashSet::from([Delivered, Cancelled]));

	m
});

/// Statuses `role` may move an order to from `current`.
pub fn allowed_transitions(role: Role, current: OrderStatus) -> HashSet<OrderStatus> {
	TRANSITIONS
		.get(&(role, current))
		.cloned()
		.unwrap_or_default()
}

/// Whether `role` may move an order from `from` to `to`.
pub fn is_allowed(role: Role, from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS
		.get(&(role, from))
		.is_some_and(|targets| targets.contains(&to))
}

/// Work the caller must do after a transition is applied to the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
	None,
	/// Every line's quantity goes back to its product's stock.
	RestoreStock,
	/// Delivery time and payment were recorded on the header.
	Settled,
}

/// Applies transitions to order headers.
pub struct OrderStateMachine;

impl OrderStateMachine {
	/// Moves `order` to `to` at `now` and records header side effects.
	///
	/// Legality is not checked here; callers consult [`is_allowed`] first.
	pub fn apply(order: &mut Order, to: OrderStatus, now: DateTime<Utc>) -> TransitionEffect {
		order.status = to;
		order.updated_at = now;
		match to {
			OrderStatus::Cancelled => TransitionEffect::RestoreStock,
			OrderStatus::Delivered => {
				// Cash on delivery: payment is collected at hand-off.
				order.delivered_at = Some(now);
				order.payment_status = PaymentStatus::Paid;
				TransitionEffect::Settled
			},
			_ => TransitionEffect::None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::sample_order;
	use market_types::OrderStatus::*;

	#[test]
	fn test_client_can_only_cancel_pending() {
		assert!(is_allowed(Role::Client, Pending, Cancelled));
		assert!(!is_allowed(Role::Client, Pending, Preparing));
		assert!(!is_allowed(Role::Client, Confirmed, Cancelled));
		assert!(allowed_transitions(Role::Client, Ready).is_empty());
	}

	#[test]
	fn test_producer_skips_confirmation() {
		assert!(is_allowed(Role::Producer, Pending, Preparing));
		assert!(!is_allowed(Role::Producer, Pending, Confirmed));
		assert!(allowed_transitions(Role::Producer, Confirmed).is_empty());
		assert!(!is_allowed(Role::Producer, Ready, Cancelled));
	}

	#[test]
	fn test_delivery_handles_last_mile_only() {
		assert_eq!(
			allowed_transitions(Role::Delivery, Ready),
			HashSet::from([InDelivery])
		);
		assert!(is_allowed(Role::Delivery, InDelivery, Delivered));
		assert!(!is_allowed(Role::Delivery, Preparing, Ready));
	}

	#[test]
	fn test_admin_can_cancel_any_open_order() {
		for status in [Pending, Confirmed, Preparing, Ready, InDelivery] {
			assert!(is_allowed(Role::Admin, status, Cancelled), "{}", status);
		}
	}

	#[test]
	fn test_terminal_states_and_self_loops_are_closed() {
		for role in [Role::Client, Role::Producer, Role::Delivery, Role::Admin] {
			for status in OrderStatus::all() {
				assert!(!is_allowed(role, status, status));
				if status.is_terminal() {
					assert!(allowed_transitions(role, status).is_empty());
				}
			}
		}
	}

	#[test]
	fn test_apply_side_effects() {
		let now = Utc::now();

		let mut stored = sample_order("c", &["p"]);
		assert_eq!(
			OrderStateMachine::apply(&mut stored.order, Delivered, now),
			TransitionEffect::Settled
		);
		assert_eq!(stored.order.payment_status, PaymentStatus::Paid);
		assert_eq!(stored.order.delivered_at, Some(now));
		assert_eq!(stored.order.updated_at, now);

		let mut stored = sample_order("c", &["p"]);
		assert_eq!(
			OrderStateMachine::apply(&mut stored.order, Cancelled, now),
			TransitionEffect::RestoreStock
		);
		assert_eq!(stored.order.payment_status, PaymentStatus::Pending);
		assert!(stored.order.delivered_at.is_none());

		let mut stored = sample_order("c", &["p"]);
		assert_eq!(
			OrderStateMachine::apply(&mut stored.order, Confirmed, now),
			TransitionEffect::None
		);
	}
}
