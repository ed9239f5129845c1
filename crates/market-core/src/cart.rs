//! Per-user carts.
//!
//! A cart is stored as one document per user holding all of its lines, so
//! every mutation re-reads the lines and the product stock inside the same
//! transaction before writing.

use crate::access::require_authenticated;
use crate::{CatalogService, MarketError};
use chrono::Utc;
use market_pricing::line_subtotal;
use market_storage::{StorageService, StorageTransaction};
use market_types::{Actor, CartItemView, CartLine, CartView, Product, StorageKey};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

fn check_quantity(quantity: Decimal) -> Result<(), MarketError> {
	if quantity <= Decimal::ZERO {
		return Err(MarketError::invalid("quantity must be greater than zero"));
	}
	Ok(())
}

fn ensure_stock(product: &Product, wanted: Decimal) -> Result<(), MarketError> {
	if !product.has_stock_for(wanted) {
		return Err(MarketError::InsufficientStock {
			product: product.name.clone(),
			available: product.stock,
		});
	}
	Ok(())
}

pub struct CartService {
	storage: Arc<StorageService>,
	catalog: Arc<CatalogService>,
}

impl CartService {
	pub fn new(storage: Arc<StorageService>, catalog: Arc<CatalogService>) -> Self {
		Self { storage, catalog }
	}

	/// The actor's cart joined with live product data.
	pub async fn get_cart(&self, actor: &Actor) -> Result<CartView, MarketError> {
		require_authenticated(actor)?;
		let lines: Vec<CartLine> = self
			.storage
			.retrieve_optional(StorageKey::Carts, &actor.id)
			.await?
			.unwrap_or_default();

		let mut items = Vec::with_capacity(lines.len());
		let mut subtotal: i64 = 0;
		for line in lines {
			let product = self.catalog.get_product(&line.product_id).await?;
			let line_total = match &product {
				Some(p) => line_subtotal(line.quantity, p.price)?,
				None => 0,
			};
			subtotal = subtotal
				.checked_add(line_total)
				.ok_or_else(|| MarketError::invalid("cart subtotal overflows"))?;
			items.push(CartItemView {
				id: line.id,
				product_id: line.product_id,
				quantity: line.quantity,
				product,
				line_subtotal: line_total,
			});
		}

		Ok(CartView {
			item_count: items.len(),
			items,
			subtotal,
		})
	}

	/// Adds `quantity` of a product, merging into an existing line.
	pub async fn add_to_cart(
		&self,
		actor: &Actor,
		product_id: &str,
		quantity: Decimal,
	) -> Result<CartView, MarketError> {
		require_authenticated(actor)?;
		check_quantity(quantity)?;

		let mut tx = self.storage.transaction().await?;
		let product = self
			.catalog
			.product_in(&tx, product_id)
			.await?
			.filter(|p| p.is_active)
			.ok_or_else(|| MarketError::not_found("Product"))?;

		let mut lines = self.lines_in(&tx, &actor.id).await?;
		let now = Utc::now();
		match lines.iter_mut().find(|l| l.product_id == product_id) {
			Some(line) => {
				let merged = line.quantity + quantity;
				ensure_stock(&product, merged)?;
				line.quantity = merged;
				line.updated_at = now;
			},
			None => {
				ensure_stock(&product, quantity)?;
				lines.push(CartLine {
					id: Uuid::new_v4().to_string(),
					user_id: actor.id.clone(),
					product_id: product_id.to_string(),
					quantity,
					created_at: now,
					updated_at: now,
				});
			},
		}

		tx.store(StorageKey::Carts, &actor.id, &lines)?;
		tx.commit().await?;
		debug!(product = %product.name, %quantity, "added to cart");

		self.get_cart(actor).await
	}

	/// Sets the absolute quantity of one of the actor's lines.
	pub async fn update_cart_item(
		&self,
		actor: &Actor,
		item_id: &str,
		quantity: Decimal,
	) -> Result<CartView, MarketError> {
		require_authenticated(actor)?;
		check_quantity(quantity)?;

		let mut tx = self.storage.transaction().await?;
		let mut lines = self.lines_in(&tx, &actor.id).await?;
		let line = lines
			.iter_mut()
			.find(|l| l.id == item_id)
			.ok_or_else(|| MarketError::not_found("Cart item"))?;

		let product = self
			.catalog
			.product_in(&tx, &line.product_id)
			.await?
			.filter(|p| p.is_active)
			.ok_or_else(|| MarketError::not_found("Product"))?;
		ensure_stock(&product, quantity)?;
		line.quantity = quantity;
		line.updated_at = Utc::now();

		tx.store(StorageKey::Carts, &actor.id, &lines)?;
		tx.commit().await?;

		self.get_cart(actor).await
	}

	/// Removes one line. Removing a line that is not there is not an error.
	pub async fn remove_from_cart(
		&self,
		actor: &Actor,
		item_id: &str,
	) -> Result<CartView, MarketError> {
		require_authenticated(actor)?;
		let mut tx = self.storage.transaction().await?;
		let mut lines = self.lines_in(&tx, &actor.id).await?;
		let before = lines.len();
		lines.retain(|l| l.id != item_id);
		if lines.len() != before {
			self.write_lines(&mut tx, &actor.id, &lines)?;
			tx.commit().await?;
		}
		self.get_cart(actor).await
	}

	/// Empties the actor's cart.
	pub async fn clear_cart(&self, actor: &Actor) -> Result<(), MarketError> {
		require_authenticated(actor)?;
		let mut tx = self.storage.transaction().await?;
		self.clear_in(&mut tx, &actor.id);
		tx.commit().await?;
		Ok(())
	}

	/// Reads a user's cart lines through the caller's transaction.
	pub async fn lines_in(
		&self,
		tx: &StorageTransaction<'_>,
		user_id: &str,
	) -> Result<Vec<CartLine>, MarketError> {
		Ok(tx
			.retrieve_optional(StorageKey::Carts, user_id)
			.await?
			.unwrap_or_default())
	}

	/// Deletes a user's cart as part of the caller's transaction.
	pub fn clear_in(&self, tx: &mut StorageTransaction<'_>, user_id: &str) {
		tx.remove(StorageKey::Carts, user_id);
	}

	fn write_lines(
		&self,
		tx: &mut StorageTransaction<'_>,
		user_id: &str,
		lines: &[CartLine],
	) -> Result<(), MarketError> {
		if lines.is_empty() {
			self.clear_in(tx, user_id);
		} else {
			tx.store(StorageKey::Carts, user_id, &lines)?;
		}
		Ok(())
	}
}
