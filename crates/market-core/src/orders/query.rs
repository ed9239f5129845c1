//! Order reads. Every listing is newest first and paginated.

use super::OrderService;
use crate::access::{can_view, relation_to_order, require_authenticated, require_role};
use crate::MarketError;
use market_types::{
	Actor, OrderListQuery, OrderStatus, OrderView, PageRequest, Paginated, Role, StorageKey,
	StoredOrder,
};
use std::collections::HashSet;

impl OrderService {
	/// One order, if the actor may see it.
	pub async fn get_order(&self, actor: &Actor, id: &str) -> Result<OrderView, MarketError> {
		require_authenticated(actor)?;
		let stored: StoredOrder = self
			.storage
			.retrieve_optional(StorageKey::Orders, id)
			.await?
			.ok_or_else(|| MarketError::not_found("Order"))?;

		let own_products = self.own_products(actor).await?;
		if !can_view(relation_to_order(actor, &stored, &own_products)) {
			return Err(MarketError::Forbidden("not allowed to view this order".into()));
		}
		self.enrich(stored).await
	}

	/// Orders placed by the actor.
	pub async fn get_my_orders(
		&self,
		actor: &Actor,
		query: &OrderListQuery,
	) -> Result<Paginated<OrderView>, MarketError> {
		require_authenticated(actor)?;
		let orders = self
			.load_sorted(query.status, |o| o.order.user_id == actor.id)
			.await?;
		self.paginate(orders, query).await
	}

	/// Orders containing at least one of the producer's products.
	///
	/// Only the producer's own lines are returned, but the header totals
	/// still describe the whole order.
	pub async fn get_producer_orders(
		&self,
		actor: &Actor,
		query: &OrderListQuery,
	) -> Result<Paginated<OrderView>, MarketError> {
		require_role(actor, &[Role::Producer])?;
		let own_products = self.catalog.producer_product_ids(&actor.id).await?;
		if own_products.is_empty() {
			return self.paginate(Vec::new(), query).await;
		}

		let orders = self
			.load_sorted(query.status, |o| {
				o.lines.iter().any(|l| own_products.contains(&l.product_id))
			})
			.await?
			.into_iter()
			.map(|mut o| {
				o.lines.retain(|l| own_products.contains(&l.product_id));
				o
			})
			.collect();
		self.paginate(orders, query).await
	}

	/// Every order. Admin only.
	pub async fn get_all_orders(
		&self,
		actor: &Actor,
		query: &OrderListQuery,
	) -> Result<Paginated<OrderView>, MarketError> {
		require_role(actor, &[Role::Admin])?;
		let orders = self.load_sorted(query.status, |_| true).await?;
		self.paginate(orders, query).await
	}

	pub(super) async fn own_products(&self, actor: &Actor) -> Result<HashSet<String>, MarketError> {
		if actor.role == Role::Producer {
			self.catalog.producer_product_ids(&actor.id).await
		} else {
			Ok(HashSet::new())
		}
	}

	async fn load_sorted(
		&self,
		status: Option<OrderStatus>,
		keep: impl Fn(&StoredOrder) -> bool,
	) -> Result<Vec<StoredOrder>, MarketError> {
		let mut orders: Vec<StoredOrder> = self
			.storage
			.list::<StoredOrder>(StorageKey::Orders)
			.await?
			.into_iter()
			.filter(|o| status.is_none_or(|s| o.order.status == s))
			.filter(|o| keep(o))
			.collect();
		orders.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
		Ok(orders)
	}

	async fn paginate(
		&self,
		orders: Vec<StoredOrder>,
		query: &OrderListQuery,
	) -> Result<Paginated<OrderView>, MarketError> {
		let (page, limit) = self.limits.resolve(&PageRequest {
			page: query.page,
			limit: query.limit,
		});
		let page = Paginated::from_sorted(orders, page, limit);
		let data = self.enrich_all(page.data).await?;
		Ok(Paginated {
			data,
			pagination: page.pagination,
		})
	}
}
