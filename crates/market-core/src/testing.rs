//! Fixtures shared by the unit tests of this crate.

use crate::orders::OrderNumbering;
use crate::{MarketEngine, PageLimits};
use chrono::Utc;
use market_pricing::implementations::flat_rate::FlatRateFee;
use market_pricing::PricingService;
use market_storage::implementations::memory::MemoryStorage;
use market_storage::StorageService;
use market_types::{
	Actor, Address, Category, NewAddress, NewCategory, NewProduct, Order, OrderLine, OrderStatus,
	PaymentMethod, PaymentStatus, Product, ProductUnit, Role, StoredOrder,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

pub fn admin() -> Actor {
	Actor::new("admin-1", Role::Admin)
}

pub fn client(id: &str) -> Actor {
	Actor::new(id, Role::Client)
}

pub fn producer(id: &str) -> Actor {
	Actor::new(id, Role::Producer)
}

pub fn courier(id: &str) -> Actor {
	Actor::new(id, Role::Delivery)
}

pub fn new_product(category_id: &str, name: &str, price: i64, stock: i64) -> NewProduct {
	NewProduct {
		category_id: category_id.to_string(),
		name: name.to_string(),
		description: String::new(),
		price,
		unit: ProductUnit::Kg,
		stock: Decimal::from(stock),
		min_quantity: None,
		origin: None,
	}
}

pub fn new_address(label: &str, city: &str) -> NewAddress {
	NewAddress {
		label: label.to_string(),
		full_address: format!("Rue 12, {}", city),
		city: city.to_string(),
		quarter: None,
		latitude: None,
		longitude: None,
		is_default: false,
	}
}

/// A pending order with one line per product id, for pure-function tests.
pub fn sample_order(user_id: &str, product_ids: &[&str]) -> StoredOrder {
	let now = Utc::now();
	let order_id = "order-1".to_string();
	let lines: Vec<OrderLine> = product_ids
		.iter()
		.enumerate()
		.map(|(i, product_id)| OrderLine {
			id: format!("line-{}", i),
			order_id: order_id.clone(),
			product_id: product_id.to_string(),
			product_name: format!("Product {}", product_id),
			quantity: Decimal::ONE,
			unit_price: 1000,
			subtotal: 1000,
		})
		.collect();
	let subtotal = lines.iter().map(|l| l.subtotal).sum::<i64>();

	StoredOrder {
		order: Order {
			id: order_id,
			order_number: "KIB-20240101-ABC123".into(),
			user_id: user_id.to_string(),
			address_id: "addr-1".into(),
			status: OrderStatus::Pending,
			subtotal,
			delivery_fee: 1000,
			total: subtotal + 1000,
			payment_method: PaymentMethod::Cod,
			payment_status: PaymentStatus::Pending,
			notes: None,
			delivery_person_id: None,
			delivered_at: None,
			created_at: now,
			updated_at: now,
		},
		lines,
	}
}

/// Engine over a seeded store with one category.
pub struct TestMarket {
	pub storage: Arc<StorageService>,
	pub engine: MarketEngine,
	pub category: Category,
}

impl TestMarket {
	pub async fn new() -> Self {
		Self::with_storage(StorageService::new(Box::new(MemoryStorage::new()))).await
	}

	pub async fn with_storage(storage: StorageService) -> Self {
		let storage = Arc::new(storage.with_lock_timeout(Duration::from_secs(5)));
		let pricing = Arc::new(PricingService::single(
			"flat_rate",
			Arc::new(FlatRateFee::default()),
		));
		let engine = MarketEngine::new(
			storage.clone(),
			pricing,
			PageLimits::default(),
			OrderNumbering::default(),
		);
		// Reopened stores already hold the category.
		let existing = engine.catalog().list_categories().await.unwrap();
		let category = match existing.into_iter().find(|c| c.slug == "legumes") {
			Some(category) => category,
			None => engine
				.catalog()
				.create_category(
					&admin(),
					NewCategory {
						name: "Legumes".into(),
						icon: None,
						parent_id: None,
						sort_order: 0,
					},
				)
				.await
				.unwrap(),
		};

		Self {
			storage,
			engine,
			category,
		}
	}

	pub async fn product(&self, producer_id: &str, name: &str, price: i64, stock: i64) -> Product {
		self.engine
			.catalog()
			.create_product(
				&producer(producer_id),
				new_product(&self.category.id, name, price, stock),
			)
			.await
			.unwrap()
	}

	pub async fn address(&self, user_id: &str, city: &str) -> Address {
		self.engine
			.addresses()
			.create_address(&client(user_id), new_address("Maison", city))
			.await
			.unwrap()
	}

	pub async fn add_to_cart(&self, user_id: &str, product_id: &str, quantity: Decimal) {
		self.engine
			.carts()
			.add_to_cart(&client(user_id), product_id, quantity)
			.await
			.unwrap();
	}

	pub async fn stock_of(&self, product_id: &str) -> Decimal {
		self.engine
			.catalog()
			.get_product(product_id)
			.await
			.unwrap()
			.unwrap()
			.stock
	}
}
