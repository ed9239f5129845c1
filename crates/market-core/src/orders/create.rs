//! Cart to order conversion.

use super::OrderService;
use crate::access::require_role;
use crate::MarketError;
use chrono::{DateTime, Utc};
use market_pricing::line_subtotal;
use market_storage::StorageTransaction;
use market_types::{
	truncate_id, Actor, CreateOrderRequest, Order, OrderLine, OrderStatus, OrderView,
	PaymentStatus, Role, StorageKey, StoredOrder,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

impl OrderService {
	/// Creates an order from the actor's cart.
	///
	/// Address check, stock decrements, order insertion and cart removal are
	/// one transaction: on any failure nothing is written and the cart is left
	/// as it was.
	#[instrument(skip_all, fields(user = %truncate_id(&actor.id)))]
	pub async fn create_order(
		&self,
		actor: &Actor,
		request: CreateOrderRequest,
	) -> Result<OrderView, MarketError> {
		require_role(actor, &[Role::Client, Role::Admin])?;
		let notes = request
			.notes
			.map(|n| n.trim().to_string())
			.filter(|n| !n.is_empty());

		let mut tx = self.storage.transaction().await?;

		let address = self
			.addresses
			.find_in(&tx, &actor.id, &request.address_id)
			.await?
			.ok_or_else(|| MarketError::not_found("Address"))?;

		let cart = self.carts.lines_in(&tx, &actor.id).await?;
		if cart.is_empty() {
			return Err(MarketError::EmptyCart);
		}

		let now = Utc::now();
		let order_id = Uuid::new_v4().to_string();
		let mut lines = Vec::with_capacity(cart.len());
		for item in &cart {
			let product = self
				.catalog
				.product_in(&tx, &item.product_id)
				.await?
				.filter(|p| p.is_active)
				.ok_or_else(|| MarketError::not_found(format!("Product {}", item.product_id)))?;

			if !self
				.catalog
				.decrement_stock(&mut tx, &product.id, item.quantity)
				.await?
			{
				warn!(
					product_id = %truncate_id(&product.id),
					requested = %item.quantity,
					available = %product.stock,
					"insufficient stock at checkout"
				);
				return Err(MarketError::InsufficientStock {
					product: product.name,
					available: product.stock,
				});
			}

			lines.push(OrderLine {
				id: Uuid::new_v4().to_string(),
				order_id: order_id.clone(),
				subtotal: line_subtotal(item.quantity, product.price)?,
				product_id: product.id,
				product_name: product.name,
				quantity: item.quantity,
				unit_price: product.price,
			});
		}

		let totals = self
			.pricing
			.breakdown(lines.iter().map(|l| l.subtotal), &address.city)?;
		let order_number = self.allocate_number(&tx, now).await?;

		let stored = StoredOrder {
			order: Order {
				id: order_id,
				order_number,
				user_id: actor.id.clone(),
				address_id: address.id,
				status: OrderStatus::Pending,
				subtotal: totals.subtotal,
				delivery_fee: totals.delivery_fee,
				total: totals.total,
				payment_method: request.payment_method.unwrap_or_default(),
				payment_status: PaymentStatus::Pending,
				notes,
				delivery_person_id: None,
				delivered_at: None,
				created_at: now,
				updated_at: now,
			},
			lines,
		};

		tx.store(StorageKey::Orders, &stored.order.id, &stored)?;
		tx.store(
			StorageKey::OrderNumbers,
			&stored.order.order_number,
			&stored.order.id,
		)?;
		self.carts.clear_in(&mut tx, &actor.id);
		tx.commit().await?;

		info!(
			order_number = %stored.order.order_number,
			lines = stored.lines.len(),
			total = stored.order.total,
			"order created"
		);
		self.enrich(stored).await
	}

	/// Draws order numbers until one is not yet taken.
	async fn allocate_number(
		&self,
		tx: &StorageTransaction<'_>,
		now: DateTime<Utc>,
	) -> Result<String, MarketError> {
		for attempt in 1..=self.numbering.attempts {
			let candidate = self.numbering.generate(now);
			if !tx.exists(StorageKey::OrderNumbers, &candidate).await? {
				return Ok(candidate);
			}
			warn!(attempt, number = %candidate, "order number collision");
		}
		Err(MarketError::Conflict(
			"could not allocate a unique order number".into(),
		))
	}
}

#[cfg(test)]
mod tests {
	use crate::testing::{client, producer, TestMarket};
	use crate::MarketError;
	use market_types::{CreateOrderRequest, OrderStatus, PaymentMethod, PaymentStatus, ProductPatch};
	use rust_decimal::Decimal;
	use std::sync::Arc;

	fn request(address_id: &str) -> CreateOrderRequest {
		CreateOrderRequest {
			address_id: address_id.to_string(),
			notes: None,
			payment_method: None,
		}
	}

	#[tokio::test]
	async fn test_totals_below_threshold() {
		let market = TestMarket::new().await;
		let tomato = market.product("p-1", "Tomates", 2500, 10).await;
		let pepper = market.product("p-2", "Piment", 500, 10).await;
		let address = market.address("c-1", "Douala").await;
		market.add_to_cart("c-1", &tomato.id, Decimal::from(1)).await;
		market.add_to_cart("c-1", &pepper.id, Decimal::from(2)).await;

		let view = market
			.engine
			.orders()
			.create_order(&client("c-1"), request(&address.id))
			.await
			.unwrap();

		let order = &view.order;
		assert_eq!(order.subtotal, 3500);
		assert_eq!(order.delivery_fee, 1000);
		assert_eq!(order.total, 4500);
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.payment_method, PaymentMethod::Cod);
		assert_eq!(order.payment_status, PaymentStatus::Pending);
		assert!(order.order_number.starts_with("KIB-"));

		let line_sum: i64 = view.items.iter().map(|i| i.line.subtotal).sum();
		assert_eq!(line_sum, order.subtotal);
		for item in &view.items {
			assert_eq!(
				Decimal::from(item.line.subtotal),
				item.line.quantity * Decimal::from(item.line.unit_price)
			);
			assert!(item.product.is_some());
		}
		assert_eq!(view.address.as_ref().map(|a| a.id.as_str()), Some(address.id.as_str()));

		assert_eq!(market.stock_of(&tomato.id).await, Decimal::from(9));
		assert_eq!(market.stock_of(&pepper.id).await, Decimal::from(8));
		let cart = market.engine.carts().get_cart(&client("c-1")).await.unwrap();
		assert_eq!(cart.item_count, 0);
	}

	#[tokio::test]
	async fn test_free_delivery_at_threshold() {
		let market = TestMarket::new().await;
		let tomato = market.product("p-1", "Tomates", 2500, 10).await;
		let address = market.address("c-1", "Yaoundé").await;
		market.add_to_cart("c-1", &tomato.id, Decimal::from(8)).await;

		let view = market
			.engine
			.orders()
			.create_order(&client("c-1"), request(&address.id))
			.await
			.unwrap();
		assert_eq!(view.order.subtotal, 20000);
		assert_eq!(view.order.delivery_fee, 0);
		assert_eq!(view.order.total, 20000);
	}

	#[tokio::test]
	async fn test_fractional_quantity_rounds() {
		let market = TestMarket::new().await;
		let beef = market.product("p-1", "Boeuf", 3333, 10).await;
		let address = market.address("c-1", "Douala").await;
		market.add_to_cart("c-1", &beef.id, Decimal::new(15, 1)).await;

		let view = market
			.engine
			.orders()
			.create_order(&client("c-1"), request(&address.id))
			.await
			.unwrap();
		// 1.5 x 3333 = 4999.5, rounded half away from zero.
		assert_eq!(view.order.subtotal, 5000);
		assert_eq!(market.stock_of(&beef.id).await, Decimal::new(85, 1));
	}

	#[tokio::test]
	async fn test_line_prices_are_snapshots() {
		let market = TestMarket::new().await;
		let tomato = market.product("p-1", "Tomates", 2500, 10).await;
		let address = market.address("c-1", "Douala").await;
		market.add_to_cart("c-1", &tomato.id, Decimal::from(2)).await;

		let view = market
			.engine
			.orders()
			.create_order(&client("c-1"), request(&address.id))
			.await
			.unwrap();

		market
			.engine
			.catalog()
			.update_product(
				&producer("p-1"),
				&tomato.id,
				ProductPatch {
					price: Some(9999),
					name: Some("Tomates bio".into()),
					..ProductPatch::default()
				},
			)
			.await
			.unwrap();

		let reread = market
			.engine
			.orders()
			.get_order(&client("c-1"), &view.order.id)
			.await
			.unwrap();
		let item = &reread.items[0];
		assert_eq!(item.line.unit_price, 2500);
		assert_eq!(item.line.product_name, "Tomates");
		assert_eq!(item.product.as_ref().map(|p| p.price), Some(9999));
		assert_eq!(reread.order.subtotal, 5000);
	}

	#[tokio::test]
	async fn test_failures_leave_cart_and_stock_intact() {
		let market = TestMarket::new().await;
		let orders = market.engine.orders();
		let tomato = market.product("p-1", "Tomates", 2500, 10).await;
		let rice = market.product("p-1", "Riz", 600, 5).await;
		let address = market.address("c-1", "Douala").await;

		assert!(matches!(
			orders.create_order(&client("c-1"), request(&address.id)).await,
			Err(MarketError::EmptyCart)
		));

		market.add_to_cart("c-1", &tomato.id, Decimal::from(2)).await;
		market.add_to_cart("c-1", &rice.id, Decimal::from(5)).await;

		// Someone else's address is invisible.
		let foreign = market.address("c-2", "Douala").await;
		assert!(matches!(
			orders.create_order(&client("c-1"), request(&foreign.id)).await,
			Err(MarketError::NotFound(_))
		));

		// Stock drops under the cart quantity after it was added.
		market
			.engine
			.catalog()
			.update_product(
				&producer("p-1"),
				&rice.id,
				ProductPatch {
					stock: Some(Decimal::from(4)),
					..ProductPatch::default()
				},
			)
			.await
			.unwrap();

		let err = orders
			.create_order(&client("c-1"), request(&address.id))
			.await
			.unwrap_err();
		match err {
			MarketError::InsufficientStock { product, available } => {
				assert_eq!(product, "Riz");
				assert_eq!(available, Decimal::from(4));
			},
			other => panic!("unexpected error: {:?}", other),
		}

		// The tomato decrement of the failed attempt was rolled back.
		assert_eq!(market.stock_of(&tomato.id).await, Decimal::from(10));
		let cart = market.engine.carts().get_cart(&client("c-1")).await.unwrap();
		assert_eq!(cart.item_count, 2);
		let mine = orders
			.get_my_orders(&client("c-1"), &Default::default())
			.await
			.unwrap();
		assert_eq!(mine.pagination.total, 0);
	}

	#[tokio::test]
	async fn test_inactive_product_blocks_checkout() {
		let market = TestMarket::new().await;
		let fish = market.product("p-1", "Poisson", 1500, 5).await;
		let address = market.address("c-1", "Douala").await;
		market.add_to_cart("c-1", &fish.id, Decimal::ONE).await;
		market
			.engine
			.catalog()
			.deactivate_product(&producer("p-1"), &fish.id)
			.await
			.unwrap();

		assert!(matches!(
			market
				.engine
				.orders()
				.create_order(&client("c-1"), request(&address.id))
				.await,
			Err(MarketError::NotFound(_))
		));
		assert_eq!(market.stock_of(&fish.id).await, Decimal::from(5));
	}

	#[tokio::test]
	async fn test_producers_cannot_order() {
		let market = TestMarket::new().await;
		assert!(matches!(
			market
				.engine
				.orders()
				.create_order(&producer("p-1"), request("any"))
				.await,
			Err(MarketError::Forbidden(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_orders_never_oversell() {
		let market = Arc::new(TestMarket::new().await);
		let last = market.product("p-1", "Dernier régime", 5000, 1).await;

		let mut buyers = Vec::new();
		for i in 0..8 {
			let user = format!("c-{}", i);
			let address = market.address(&user, "Douala").await;
			market.add_to_cart(&user, &last.id, Decimal::ONE).await;
			buyers.push((user, address.id));
		}

		let handles: Vec<_> = buyers
			.into_iter()
			.map(|(user, address_id)| {
				let market = market.clone();
				tokio::spawn(async move {
					market
						.engine
						.orders()
						.create_order(&client(&user), request(&address_id))
						.await
				})
			})
			.collect();

		let mut created = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => created += 1,
				Err(MarketError::InsufficientStock { available, .. }) => {
					assert_eq!(available, Decimal::ZERO)
				},
				Err(other) => panic!("unexpected error: {:?}", other),
			}
		}
		assert_eq!(created, 1);
		assert_eq!(market.stock_of(&last.id).await, Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_notes_and_payment_method() {
		let market = TestMarket::new().await;
		let tomato = market.product("p-1", "Tomates", 2500, 10).await;
		let address = market.address("c-1", "Douala").await;
		market.add_to_cart("c-1", &tomato.id, Decimal::ONE).await;

		let view = market
			.engine
			.orders()
			.create_order(
				&client("c-1"),
				CreateOrderRequest {
					address_id: address.id,
					notes: Some("  Sonner deux fois ".into()),
					payment_method: Some(PaymentMethod::MobileMoney),
				},
			)
			.await
			.unwrap();
		assert_eq!(view.order.notes.as_deref(), Some("Sonner deux fois"));
		assert_eq!(view.order.payment_method, PaymentMethod::MobileMoney);
	}
}
