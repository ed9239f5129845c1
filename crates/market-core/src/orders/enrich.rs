//! Joins stored orders with current product and address records.

use super::OrderService;
use crate::MarketError;
use market_types::{OrderItemView, OrderView, Product, StoredOrder};
use std::collections::HashMap;

impl OrderService {
	/// Attaches the current product to each line and the delivery address.
	///
	/// Products or addresses deleted since the order was placed come back as
	/// `None`; the line snapshot is unaffected.
	pub(super) async fn enrich(&self, stored: StoredOrder) -> Result<OrderView, MarketError> {
		let mut products = HashMap::new();
		self.enrich_with(stored, &mut products).await
	}

	/// Enriches a page of orders, loading each product once.
	pub(super) async fn enrich_all(
		&self,
		orders: Vec<StoredOrder>,
	) -> Result<Vec<OrderView>, MarketError> {
		let mut products = HashMap::new();
		let mut views = Vec::with_capacity(orders.len());
		for stored in orders {
			views.push(self.enrich_with(stored, &mut products).await?);
		}
		Ok(views)
	}

	async fn enrich_with(
		&self,
		stored: StoredOrder,
		products: &mut HashMap<String, Option<Product>>,
	) -> Result<OrderView, MarketError> {
		let mut items = Vec::with_capacity(stored.lines.len());
		for line in stored.lines {
			let product = match products.get(&line.product_id) {
				Some(cached) => cached.clone(),
				None => {
					let loaded = self.catalog.get_product(&line.product_id).await?;
					products.insert(line.product_id.clone(), loaded.clone());
					loaded
				},
			};
			items.push(OrderItemView { line, product });
		}

		let address = self
			.addresses
			.lookup(&stored.order.user_id, &stored.order.address_id)
			.await?;

		Ok(OrderView {
			order: stored.order,
			items,
			address,
		})
	}
}
