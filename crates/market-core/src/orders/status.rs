//! Status transitions and delivery assignment.

use super::OrderService;
use crate::access::{
	can_update_status, relation_to_order, require_authenticated, require_role, OrderRelation,
};
use crate::state::{is_allowed, OrderStateMachine, TransitionEffect};
use crate::MarketError;
use chrono::Utc;
use market_types::{truncate_id, Actor, OrderStatus, OrderView, Role, StorageKey, StoredOrder};
use tracing::{info, instrument};

impl OrderService {
	/// Moves an order to `target` on behalf of `actor`.
	///
	/// The current status is read under the writer lock, so two conflicting
	/// requests cannot both succeed from the same starting status. Cancelling
	/// returns every line's quantity to stock in the same write.
	#[instrument(skip_all, fields(order_id = %truncate_id(id), role = %actor.role, to = %target))]
	pub async fn update_order_status(
		&self,
		actor: &Actor,
		id: &str,
		target: OrderStatus,
	) -> Result<OrderView, MarketError> {
		require_authenticated(actor)?;
		let own_products = self.own_products(actor).await?;

		let mut tx = self.storage.transaction().await?;
		let mut stored: StoredOrder = tx
			.retrieve_optional(StorageKey::Orders, id)
			.await?
			.ok_or_else(|| MarketError::not_found("Order"))?;

		let relation = relation_to_order(actor, &stored, &own_products);
		if !can_update_status(actor, relation) {
			return Err(MarketError::Forbidden("not allowed to change this order".into()));
		}

		let from = stored.order.status;
		if !is_allowed(actor.role, from, target) {
			return Err(MarketError::ForbiddenTransition { from, to: target });
		}

		// A courier moving an unassigned order takes it over.
		if relation == OrderRelation::UnassignedCourier {
			stored.order.delivery_person_id = Some(actor.id.clone());
		}

		let effect = OrderStateMachine::apply(&mut stored.order, target, Utc::now());
		let restock = effect == TransitionEffect::RestoreStock;
		if restock {
			for line in &stored.lines {
				self.catalog
					.increment_stock(&mut tx, &line.product_id, line.quantity)
					.await?;
			}
		}

		tx.store(StorageKey::Orders, id, &stored)?;
		tx.commit().await?;

		info!(
			order_number = %stored.order.order_number,
			%from,
			restock,
			"order status updated"
		);
		self.enrich(stored).await
	}

	/// Assigns a delivery person. Admin only; finished orders are rejected.
	#[instrument(skip_all, fields(order_id = %truncate_id(id)))]
	pub async fn assign_delivery_person(
		&self,
		actor: &Actor,
		id: &str,
		delivery_person_id: &str,
	) -> Result<OrderView, MarketError> {
		require_role(actor, &[Role::Admin])?;
		let delivery_person_id = delivery_person_id.trim();
		if delivery_person_id.is_empty() {
			return Err(MarketError::invalid("deliveryPersonId must not be empty"));
		}

		let mut tx = self.storage.transaction().await?;
		let mut stored: StoredOrder = tx
			.retrieve_optional(StorageKey::Orders, id)
			.await?
			.ok_or_else(|| MarketError::not_found("Order"))?;
		if stored.order.status.is_terminal() {
			return Err(MarketError::invalid(format!(
				"order is already {}",
				stored.order.status
			)));
		}

		stored.order.delivery_person_id = Some(delivery_person_id.to_string());
		stored.order.updated_at = Utc::now();
		tx.store(StorageKey::Orders, id, &stored)?;
		tx.commit().await?;

		info!(
			order_number = %stored.order.order_number,
			courier = %truncate_id(delivery_person_id),
			"delivery person assigned"
		);
		self.enrich(stored).await
	}
}

#[cfg(test)]
mod tests {
	use crate::testing::{admin, client, courier, producer, TestMarket};
	use crate::MarketError;
	use market_types::{CreateOrderRequest, OrderStatus, OrderView, PaymentStatus, Product};
	use rust_decimal::Decimal;
	use std::sync::Arc;

	async fn setup() -> (TestMarket, Product, Product, OrderView) {
		let market = TestMarket::new().await;
		let tomato = market.product("farmer-a", "Tomates", 1000, 10).await;
		let yam = market.product("farmer-b", "Igname", 700, 10).await;
		let address = market.address("c-1", "Douala").await;
		market.add_to_cart("c-1", &tomato.id, Decimal::from(3)).await;
		market.add_to_cart("c-1", &yam.id, Decimal::new(25, 1)).await;
		let order = market
			.engine
			.orders()
			.create_order(
				&client("c-1"),
				CreateOrderRequest {
					address_id: address.id,
					notes: None,
					payment_method: None,
				},
			)
			.await
			.unwrap();
		(market, tomato, yam, order)
	}

	#[tokio::test]
	async fn test_client_cannot_skip_ahead() {
		let (market, _, _, order) = setup().await;
		let orders = market.engine.orders();

		let err = orders
			.update_order_status(&client("c-1"), &order.order.id, OrderStatus::Preparing)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			MarketError::ForbiddenTransition {
				from: OrderStatus::Pending,
				to: OrderStatus::Preparing
			}
		));

		let view = orders
			.update_order_status(&producer("farmer-a"), &order.order.id, OrderStatus::Preparing)
			.await
			.unwrap();
		assert_eq!(view.order.status, OrderStatus::Preparing);
	}

	#[tokio::test]
	async fn test_cancel_restores_exact_stock() {
		let (market, tomato, yam, order) = setup().await;
		assert_eq!(market.stock_of(&tomato.id).await, Decimal::from(7));
		assert_eq!(market.stock_of(&yam.id).await, Decimal::new(75, 1));

		market
			.engine
			.orders()
			.update_order_status(&client("c-1"), &order.order.id, OrderStatus::Cancelled)
			.await
			.unwrap();

		assert_eq!(market.stock_of(&tomato.id).await, Decimal::from(10));
		assert_eq!(market.stock_of(&yam.id).await, Decimal::from(10));

		// Cancelled is terminal, so stock cannot be restored twice.
		let err = market
			.engine
			.orders()
			.update_order_status(&admin(), &order.order.id, OrderStatus::Cancelled)
			.await
			.unwrap_err();
		assert!(matches!(err, MarketError::ForbiddenTransition { .. }));
		assert_eq!(market.stock_of(&tomato.id).await, Decimal::from(10));
	}

	#[tokio::test]
	async fn test_full_lifecycle_settles_payment() {
		let (market, _, _, order) = setup().await;
		let orders = market.engine.orders();
		let id = &order.order.id;

		orders.update_order_status(&admin(), id, OrderStatus::Confirmed).await.unwrap();
		orders.update_order_status(&admin(), id, OrderStatus::Preparing).await.unwrap();
		orders
			.update_order_status(&producer("farmer-b"), id, OrderStatus::Ready)
			.await
			.unwrap();
		orders.assign_delivery_person(&admin(), id, "rider-1").await.unwrap();
		orders
			.update_order_status(&courier("rider-1"), id, OrderStatus::InDelivery)
			.await
			.unwrap();
		let delivered = orders
			.update_order_status(&courier("rider-1"), id, OrderStatus::Delivered)
			.await
			.unwrap();

		assert_eq!(delivered.order.status, OrderStatus::Delivered);
		assert_eq!(delivered.order.payment_status, PaymentStatus::Paid);
		assert!(delivered.order.delivered_at.is_some());

		assert!(matches!(
			orders.assign_delivery_person(&admin(), id, "rider-2").await,
			Err(MarketError::ValidationFailed(_))
		));
	}

	#[tokio::test]
	async fn test_unassigned_courier_claims_order() {
		let (market, _, _, order) = setup().await;
		let orders = market.engine.orders();
		let id = &order.order.id;

		orders.update_order_status(&admin(), id, OrderStatus::Confirmed).await.unwrap();
		orders.update_order_status(&admin(), id, OrderStatus::Preparing).await.unwrap();
		orders.update_order_status(&admin(), id, OrderStatus::Ready).await.unwrap();

		let picked = orders
			.update_order_status(&courier("rider-x"), id, OrderStatus::InDelivery)
			.await
			.unwrap();
		assert_eq!(picked.order.delivery_person_id.as_deref(), Some("rider-x"));
		assert!(orders.get_order(&courier("rider-x"), id).await.is_ok());

		assert!(matches!(
			orders
				.update_order_status(&courier("rider-y"), id, OrderStatus::Delivered)
				.await,
			Err(MarketError::Forbidden(_))
		));
		assert!(matches!(
			orders.get_order(&courier("rider-y"), id).await,
			Err(MarketError::Forbidden(_))
		));

		let delivered = orders
			.update_order_status(&courier("rider-x"), id, OrderStatus::Delivered)
			.await
			.unwrap();
		assert_eq!(delivered.order.status, OrderStatus::Delivered);
	}

	#[tokio::test]
	async fn test_relationship_required() {
		let (market, _, _, order) = setup().await;
		let orders = market.engine.orders();
		let id = &order.order.id;

		assert!(matches!(
			orders
				.update_order_status(&client("c-2"), id, OrderStatus::Cancelled)
				.await,
			Err(MarketError::Forbidden(_))
		));
		assert!(matches!(
			orders
				.update_order_status(&producer("farmer-z"), id, OrderStatus::Preparing)
				.await,
			Err(MarketError::Forbidden(_))
		));
		assert!(matches!(
			orders
				.update_order_status(&admin(), "missing", OrderStatus::Confirmed)
				.await,
			Err(MarketError::NotFound(_))
		));

		orders.assign_delivery_person(&admin(), id, "rider-1").await.unwrap();
		orders.update_order_status(&admin(), id, OrderStatus::Confirmed).await.unwrap();
		orders.update_order_status(&admin(), id, OrderStatus::Preparing).await.unwrap();
		orders.update_order_status(&admin(), id, OrderStatus::Ready).await.unwrap();
		assert!(matches!(
			orders
				.update_order_status(&courier("rider-2"), id, OrderStatus::InDelivery)
				.await,
			Err(MarketError::Forbidden(_))
		));
		assert!(matches!(
			orders
				.assign_delivery_person(&producer("farmer-a"), id, "rider-2")
				.await,
			Err(MarketError::Forbidden(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_conflicting_transitions_serialize() {
		let (market, tomato, _, order) = setup().await;
		let market = Arc::new(market);
		let id = order.order.id.clone();

		let cancel = {
			let market = market.clone();
			let id = id.clone();
			tokio::spawn(async move {
				market
					.engine
					.orders()
					.update_order_status(&client("c-1"), &id, OrderStatus::Cancelled)
					.await
			})
		};
		let prepare = {
			let market = market.clone();
			let id = id.clone();
			tokio::spawn(async move {
				market
					.engine
					.orders()
					.update_order_status(&producer("farmer-a"), &id, OrderStatus::Preparing)
					.await
			})
		};

		let cancelled = cancel.await.unwrap();
		let prepared = prepare.await.unwrap();
		assert_eq!(cancelled.is_ok() as u8 + prepared.is_ok() as u8, 1);

		let expected_stock = if cancelled.is_ok() {
			Decimal::from(10)
		} else {
			assert!(matches!(cancelled, Err(MarketError::ForbiddenTransition { .. })));
			Decimal::from(7)
		};
		assert_eq!(market.stock_of(&tomato.id).await, expected_stock);
	}
}
