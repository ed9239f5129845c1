//! Authorization helpers.
//!
//! Identity arrives already authenticated; these checks only decide what an
//! actor may do or see.

use crate::MarketError;
use market_types::{Actor, Role, StoredOrder};
use std::collections::HashSet;

/// Rejects actors without an identity.
pub fn require_authenticated(actor: &Actor) -> Result<(), MarketError> {
	if actor.id.trim().is_empty() {
		return Err(MarketError::Unauthenticated);
	}
	Ok(())
}

/// Requires the actor to hold one of `allowed`.
pub fn require_role(actor: &Actor, allowed: &[Role]) -> Result<(), MarketError> {
	require_authenticated(actor)?;
	if allowed.contains(&actor.role) {
		Ok(())
	} else {
		Err(MarketError::Forbidden(format!(
			"role {} is not permitted for this operation",
			actor.role
		)))
	}
}

/// How an actor is related to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRelation {
	Admin,
	Owner,
	/// Producer with at least one line in the order.
	Supplier,
	/// The delivery person assigned to the order.
	Courier,
	/// Delivery role on an order nobody has been assigned to yet.
	UnassignedCourier,
	None,
}

/// Classifies `actor` against `stored`.
///
/// `own_products` holds the ids of the products the actor sells and is only
/// consulted for producers.
pub fn relation_to_order(
	actor: &Actor,
	stored: &StoredOrder,
	own_products: &HashSet<String>,
) -> OrderRelation {
	let order = &stored.order;
	match actor.role {
		Role::Admin => OrderRelation::Admin,
		_ if order.user_id == actor.id => OrderRelation::Owner,
		Role::Producer
			if stored
				.lines
				.iter()
				.any(|line| own_products.contains(&line.product_id)) =>
		{
			OrderRelation::Supplier
		},
		Role::Delivery => match order.delivery_person_id.as_deref() {
			Some(assigned) if assigned == actor.id => OrderRelation::Courier,
			None => OrderRelation::UnassignedCourier,
			Some(_) => OrderRelation::None,
		},
		_ => OrderRelation::None,
	}
}

/// Whether the relation allows reading the order.
pub fn can_view(relation: OrderRelation) -> bool {
	matches!(
		relation,
		OrderRelation::Admin | OrderRelation::Owner | OrderRelation::Supplier | OrderRelation::Courier
	)
}

/// Whether the relation allows requesting a status change under the actor's
/// role. The transition table still decides which targets are legal.
pub fn can_update_status(actor: &Actor, relation: OrderRelation) -> bool {
	match actor.role {
		Role::Admin => true,
		Role::Client => relation == OrderRelation::Owner,
		Role::Producer => relation == OrderRelation::Supplier,
		Role::Delivery => matches!(
			relation,
			OrderRelation::Courier | OrderRelation::UnassignedCourier
		),
	}
}
