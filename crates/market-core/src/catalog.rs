//! Catalog store: categories, products and stock.
//!
//! Stock is only ever changed through [`CatalogService::decrement_stock`] and
//! [`CatalogService::increment_stock`] inside a caller's transaction, or by an
//! explicit producer edit through [`CatalogService::update_product`].

use crate::access::{require_authenticated, require_role};
use crate::{MarketError, PageLimits};
use chrono::Utc;
use market_storage::{StorageService, StorageTransaction};
use market_types::{
	truncate_id, Actor, Category, NewCategory, NewProduct, PageRequest, Paginated, Product,
	ProductFilter, ProductImage, ProductPatch, Role, StorageKey,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Lowercase ASCII slug: runs of anything else collapse into one `-`.
pub fn slugify(name: &str) -> String {
	let mut slug = String::with_capacity(name.len());
	for c in name.chars() {
		if c.is_ascii_alphanumeric() {
			slug.push(c.to_ascii_lowercase());
		} else if !slug.ends_with('-') {
			slug.push('-');
		}
	}
	slug.trim_matches('-').to_string()
}

fn non_empty(field: &str, value: &str) -> Result<String, MarketError> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(MarketError::invalid(format!("{} must not be empty", field)));
	}
	Ok(trimmed.to_string())
}

fn check_price(price: i64) -> Result<(), MarketError> {
	if price < 0 {
		return Err(MarketError::invalid("price must not be negative"));
	}
	Ok(())
}

fn check_stock(stock: Decimal) -> Result<(), MarketError> {
	if stock.is_sign_negative() && !stock.is_zero() {
		return Err(MarketError::invalid("stock must not be negative"));
	}
	Ok(())
}

fn check_min_quantity(min_quantity: Decimal) -> Result<(), MarketError> {
	if min_quantity <= Decimal::ZERO {
		return Err(MarketError::invalid("minQuantity must be greater than zero"));
	}
	Ok(())
}

pub struct CatalogService {
	storage: Arc<StorageService>,
	limits: PageLimits,
}

impl CatalogService {
	pub fn new(storage: Arc<StorageService>, limits: PageLimits) -> Self {
		Self { storage, limits }
	}

	// ---- categories ----

	/// Creates a category. Admin only; slugs are unique.
	pub async fn create_category(
		&self,
		actor: &Actor,
		input: NewCategory,
	) -> Result<Category, MarketError> {
		require_role(actor, &[Role::Admin])?;
		let name = non_empty("name", &input.name)?;
		let slug = slugify(&name);
		if slug.is_empty() {
			return Err(MarketError::invalid(
				"name must contain at least one letter or digit",
			));
		}

		let mut tx = self.storage.transaction().await?;
		let existing: Vec<Category> = tx.list(StorageKey::Categories).await?;
		if existing.iter().any(|c| c.slug == slug) {
			return Err(MarketError::Conflict(format!(
				"category slug '{}' already exists",
				slug
			)));
		}
		if let Some(parent) = &input.parent_id {
			if !existing.iter().any(|c| &c.id == parent) {
				return Err(MarketError::not_found("Parent category"));
			}
		}

		let category = Category {
			id: Uuid::new_v4().to_string(),
			name,
			slug,
			icon: input.icon,
			parent_id: input.parent_id,
			is_active: true,
			sort_order: input.sort_order,
		};
		tx.store(StorageKey::Categories, &category.id, &category)?;
		tx.commit().await?;

		info!(category = %category.slug, "category created");
		Ok(category)
	}

	/// Active categories ordered by `sortOrder`, then name.
	pub async fn list_categories(&self) -> Result<Vec<Category>, MarketError> {
		let mut categories: Vec<Category> = self
			.storage
			.list::<Category>(StorageKey::Categories)
			.await?
			.into_iter()
			.filter(|c| c.is_active)
			.collect();
		categories.sort_by(|a, b| {
			a.sort_order
				.cmp(&b.sort_order)
				.then_with(|| a.name.cmp(&b.name))
		});
		Ok(categories)
	}

	pub async fn get_category(&self, id: &str) -> Result<Category, MarketError> {
		self.storage
			.retrieve_optional(StorageKey::Categories, id)
			.await?
			.ok_or_else(|| MarketError::not_found("Category"))
	}

	// ---- products ----

	/// Creates a product owned by the calling producer (or admin).
	#[instrument(skip_all, fields(producer = %truncate_id(&actor.id)))]
	pub async fn create_product(
		&self,
		actor: &Actor,
		input: NewProduct,
	) -> Result<Product, MarketError> {
		require_role(actor, &[Role::Producer, Role::Admin])?;
		let name = non_empty("name", &input.name)?;
		check_price(input.price)?;
		check_stock(input.stock)?;
		let min_quantity = input.min_quantity.unwrap_or(Decimal::ONE);
		check_min_quantity(min_quantity)?;

		let mut tx = self.storage.transaction().await?;
		if !tx.exists(StorageKey::Categories, &input.category_id).await? {
			return Err(MarketError::not_found("Category"));
		}

		let now = Utc::now();
		let product = Product {
			id: Uuid::new_v4().to_string(),
			producer_id: actor.id.clone(),
			category_id: input.category_id,
			name,
			description: input.description.trim().to_string(),
			price: input.price,
			unit: input.unit,
			stock: input.stock,
			min_quantity,
			origin: input.origin.filter(|o| !o.trim().is_empty()),
			is_active: true,
			images: Vec::new(),
			created_at: now,
			updated_at: now,
		};
		tx.store(StorageKey::Products, &product.id, &product)?;
		tx.commit().await?;

		info!(product_id = %truncate_id(&product.id), name = %product.name, "product created");
		Ok(product)
	}

	/// Loads a product for modification by its owner or an admin.
	async fn owned_product(
		&self,
		tx: &StorageTransaction<'_>,
		actor: &Actor,
		id: &str,
	) -> Result<Product, MarketError> {
		require_role(actor, &[Role::Producer, Role::Admin])?;
		let product: Product = tx
			.retrieve_optional(StorageKey::Products, id)
			.await?
			.ok_or_else(|| MarketError::not_found("Product"))?;
		if !actor.is_admin() && product.producer_id != actor.id {
			return Err(MarketError::Forbidden(
				"only the owning producer may modify this product".into(),
			));
		}
		Ok(product)
	}

	/// Partial update by the owning producer or an admin.
	#[instrument(skip_all, fields(product_id = %truncate_id(id)))]
	pub async fn update_product(
		&self,
		actor: &Actor,
		id: &str,
		patch: ProductPatch,
	) -> Result<Product, MarketError> {
		let mut tx = self.storage.transaction().await?;
		let mut product = self.owned_product(&tx, actor, id).await?;

		if let Some(name) = patch.name {
			product.name = non_empty("name", &name)?;
		}
		if let Some(description) = patch.description {
			product.description = description.trim().to_string();
		}
		if let Some(price) = patch.price {
			check_price(price)?;
			product.price = price;
		}
		if let Some(unit) = patch.unit {
			product.unit = unit;
		}
		if let Some(category_id) = patch.category_id {
			if !tx.exists(StorageKey::Categories, &category_id).await? {
				return Err(MarketError::not_found("Category"));
			}
			product.category_id = category_id;
		}
		if let Some(stock) = patch.stock {
			check_stock(stock)?;
			product.stock = stock;
		}
		if let Some(min_quantity) = patch.min_quantity {
			check_min_quantity(min_quantity)?;
			product.min_quantity = min_quantity;
		}
		if let Some(origin) = patch.origin {
			product.origin = Some(origin).filter(|o| !o.trim().is_empty());
		}
		if let Some(is_active) = patch.is_active {
			product.is_active = is_active;
		}
		product.updated_at = Utc::now();

		tx.store(StorageKey::Products, &product.id, &product)?;
		tx.commit().await?;
		Ok(product)
	}

	/// Soft delete: the product stays referenced by orders but is no longer
	/// sellable.
	pub async fn deactivate_product(&self, actor: &Actor, id: &str) -> Result<(), MarketError> {
		let mut tx = self.storage.transaction().await?;
		let mut product = self.owned_product(&tx, actor, id).await?;
		product.is_active = false;
		product.updated_at = Utc::now();
		tx.store(StorageKey::Products, &product.id, &product)?;
		tx.commit().await?;
		info!(product_id = %truncate_id(id), "product deactivated");
		Ok(())
	}

	/// Attaches an image. A new primary image demotes the previous one.
	pub async fn add_product_image(
		&self,
		actor: &Actor,
		id: &str,
		url: &str,
		is_primary: bool,
	) -> Result<Product, MarketError> {
		let url = non_empty("url", url)?;
		let mut tx = self.storage.transaction().await?;
		let mut product = self.owned_product(&tx, actor, id).await?;

		let is_primary = is_primary || product.images.is_empty();
		if is_primary {
			product.images.iter_mut().for_each(|img| img.is_primary = false);
		}
		product.images.push(ProductImage {
			id: Uuid::new_v4().to_string(),
			url,
			is_primary,
		});
		product.updated_at = Utc::now();

		tx.store(StorageKey::Products, &product.id, &product)?;
		tx.commit().await?;
		Ok(product)
	}

	/// Removes an image; if it was primary the first remaining one takes over.
	pub async fn remove_product_image(
		&self,
		actor: &Actor,
		id: &str,
		image_id: &str,
	) -> Result<Product, MarketError> {
		let mut tx = self.storage.transaction().await?;
		let mut product = self.owned_product(&tx, actor, id).await?;

		let position = product
			.images
			.iter()
			.position(|img| img.id == image_id)
			.ok_or_else(|| MarketError::not_found("Image"))?;
		let removed = product.images.remove(position);
		if removed.is_primary {
			if let Some(first) = product.images.first_mut() {
				first.is_primary = true;
			}
		}
		product.updated_at = Utc::now();

		tx.store(StorageKey::Products, &product.id, &product)?;
		tx.commit().await?;
		Ok(product)
	}

	/// Looks up a product regardless of its active flag.
	pub async fn get_product(&self, id: &str) -> Result<Option<Product>, MarketError> {
		Ok(self.storage.retrieve_optional(StorageKey::Products, id).await?)
	}

	/// Public product page: inactive products are hidden from everyone but
	/// their producer and admins.
	pub async fn view_product(
		&self,
		actor: Option<&Actor>,
		id: &str,
	) -> Result<Product, MarketError> {
		self.get_product(id)
			.await?
			.filter(|p| p.is_active || may_see_inactive(actor, &p.producer_id))
			.ok_or_else(|| MarketError::not_found("Product"))
	}

	/// Filtered listing, newest first.
	pub async fn list_products(
		&self,
		actor: Option<&Actor>,
		filter: &ProductFilter,
		page: &PageRequest,
	) -> Result<Paginated<Product>, MarketError> {
		let search = filter
			.search
			.as_deref()
			.map(|s| s.trim().to_lowercase())
			.filter(|s| !s.is_empty());

		let mut products: Vec<Product> = self
			.storage
			.list::<Product>(StorageKey::Products)
			.await?
			.into_iter()
			.filter(|p| {
				p.is_active
					|| (filter.include_inactive && may_see_inactive(actor, &p.producer_id))
			})
			.filter(|p| filter.category_id.as_ref().is_none_or(|c| &p.category_id == c))
			.filter(|p| filter.producer_id.as_ref().is_none_or(|id| &p.producer_id == id))
			.filter(|p| {
				search
					.as_ref()
					.is_none_or(|s| p.name.to_lowercase().contains(s.as_str()))
			})
			.collect();
		products.sort_by(|a, b| b.created_at.cmp(&a.created_at));

		let (page, limit) = self.limits.resolve(page);
		Ok(Paginated::from_sorted(products, page, limit))
	}

	/// The calling producer's products, including deactivated ones.
	pub async fn list_my_products(
		&self,
		actor: &Actor,
		page: &PageRequest,
	) -> Result<Paginated<Product>, MarketError> {
		require_role(actor, &[Role::Producer])?;
		let filter = ProductFilter {
			producer_id: Some(actor.id.clone()),
			include_inactive: true,
			..ProductFilter::default()
		};
		self.list_products(Some(actor), &filter, page).await
	}

	/// Ids of every product sold by `producer_id`, active or not.
	pub async fn producer_product_ids(
		&self,
		producer_id: &str,
	) -> Result<HashSet<String>, MarketError> {
		Ok(self
			.storage
			.list::<Product>(StorageKey::Products)
			.await?
			.into_iter()
			.filter(|p| p.producer_id == producer_id)
			.map(|p| p.id)
			.collect())
	}

	// ---- stock (transactional) ----

	/// Reads a product through the caller's transaction.
	pub async fn product_in(
		&self,
		tx: &StorageTransaction<'_>,
		id: &str,
	) -> Result<Option<Product>, MarketError> {
		Ok(tx.retrieve_optional(StorageKey::Products, id).await?)
	}

	/// Takes `quantity` out of stock if enough is available.
	///
	/// Returns `false` and leaves the product untouched when stock is short.
	pub async fn decrement_stock(
		&self,
		tx: &mut StorageTransaction<'_>,
		id: &str,
		quantity: Decimal,
	) -> Result<bool, MarketError> {
		let mut product = self
			.product_in(tx, id)
			.await?
			.ok_or_else(|| MarketError::not_found(format!("Product {}", id)))?;
		if !product.has_stock_for(quantity) {
			return Ok(false);
		}
		product.stock -= quantity;
		product.updated_at = Utc::now();
		tx.store(StorageKey::Products, id, &product)?;
		Ok(true)
	}

	/// Puts `quantity` back into stock.
	pub async fn increment_stock(
		&self,
		tx: &mut StorageTransaction<'_>,
		id: &str,
		quantity: Decimal,
	) -> Result<(), MarketError> {
		let Some(mut product) = self.product_in(tx, id).await? else {
			// Products are only soft deleted, so this means the record was
			// removed out of band.
			warn!(product_id = %truncate_id(id), %quantity, "cannot restore stock of missing product");
			return Ok(());
		};
		product.stock += quantity;
		product.updated_at = Utc::now();
		tx.store(StorageKey::Products, id, &product)?;
		Ok(())
	}
}

fn may_see_inactive(actor: Option<&Actor>, producer_id: &str) -> bool {
	actor.is_some_and(|a| {
		require_authenticated(a).is_ok() && (a.is_admin() || a.id == producer_id)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{admin, client, new_product, producer, TestMarket};

	#[test]
	fn test_slugify() {
		assert_eq!(slugify("Fruits & Légumes"), "fruits-l-gumes");
		assert_eq!(slugify("  Céréales  "), "c-r-ales");
		assert_eq!(slugify("Tubercules"), "tubercules");
		assert_eq!(slugify("--"), "");
	}

	#[tokio::test]
	async fn test_category_rules() {
		let market = TestMarket::new().await;
		let catalog = market.engine.catalog();

		let err = catalog
			.create_category(
				&producer("p-1"),
				NewCategory {
					name: "Légumes".into(),
					icon: None,
					parent_id: None,
					sort_order: 0,
				},
			)
			.await
			.unwrap_err();
		assert!(matches!(err, MarketError::Forbidden(_)));

		let dup = catalog
			.create_category(
				&admin(),
				NewCategory {
					name: market.category.name.to_uppercase(),
					icon: None,
					parent_id: None,
					sort_order: 1,
				},
			)
			.await
			.unwrap_err();
		assert!(matches!(dup, MarketError::Conflict(_)));

		let categories = catalog.list_categories().await.unwrap();
		assert_eq!(categories.len(), 1);
	}

	#[tokio::test]
	async fn test_product_ownership_and_visibility() {
		let market = TestMarket::new().await;
		let catalog = market.engine.catalog();
		let product = market.product("p-1", "Tomates", 500, 10).await;

		let err = catalog
			.update_product(
				&producer("p-2"),
				&product.id,
				ProductPatch {
					price: Some(1),
					..ProductPatch::default()
				},
			)
			.await
			.unwrap_err();
		assert!(matches!(err, MarketError::Forbidden(_)));

		catalog.deactivate_product(&producer("p-1"), &product.id).await.unwrap();

		let public = catalog
			.list_products(None, &ProductFilter::default(), &PageRequest::default())
			.await
			.unwrap();
		assert!(public.data.is_empty());
		assert!(catalog.view_product(Some(&client("c-1")), &product.id).await.is_err());
		assert!(catalog.view_product(Some(&producer("p-1")), &product.id).await.is_ok());

		let mine = catalog
			.list_my_products(&producer("p-1"), &PageRequest::default())
			.await
			.unwrap();
		assert_eq!(mine.pagination.total, 1);
	}

	#[tokio::test]
	async fn test_product_validation() {
		let market = TestMarket::new().await;
		let catalog = market.engine.catalog();

		let mut input = new_product(&market.category.id, "Oignons", 300, 5);
		input.stock = Decimal::from(-1);
		assert!(matches!(
			catalog.create_product(&producer("p-1"), input).await,
			Err(MarketError::ValidationFailed(_))
		));

		let input = new_product("missing", "Oignons", 300, 5);
		assert!(matches!(
			catalog.create_product(&producer("p-1"), input).await,
			Err(MarketError::NotFound(_))
		));

		let input = new_product(&market.category.id, "Oignons", 300, 5);
		assert!(matches!(
			catalog.create_product(&client("c-1"), input).await,
			Err(MarketError::Forbidden(_))
		));
	}

	#[tokio::test]
	async fn test_search_and_images() {
		let market = TestMarket::new().await;
		let catalog = market.engine.catalog();
		let tomato = market.product("p-1", "Tomates cerises", 500, 10).await;
		market.product("p-1", "Piment", 200, 10).await;

		let filter = ProductFilter {
			search: Some("TOMATE".into()),
			..ProductFilter::default()
		};
		let found = catalog
			.list_products(None, &filter, &PageRequest::default())
			.await
			.unwrap();
		assert_eq!(found.data.len(), 1);
		assert_eq!(found.data[0].id, tomato.id);

		let owner = producer("p-1");
		let with_one = catalog
			.add_product_image(&owner, &tomato.id, "https://img/1.jpg", false)
			.await
			.unwrap();
		assert!(with_one.images[0].is_primary);

		let with_two = catalog
			.add_product_image(&owner, &tomato.id, "https://img/2.jpg", true)
			.await
			.unwrap();
		assert_eq!(with_two.images.iter().filter(|i| i.is_primary).count(), 1);
		assert!(with_two.images[1].is_primary);

		let first_id = with_two.images[1].id.clone();
		let after = catalog
			.remove_product_image(&owner, &tomato.id, &first_id)
			.await
			.unwrap();
		assert_eq!(after.images.len(), 1);
		assert!(after.images[0].is_primary);
	}

	#[tokio::test]
	async fn test_conditional_decrement() {
		let market = TestMarket::new().await;
		let catalog = market.engine.catalog();
		let product = market.product("p-1", "Mangues", 100, 3).await;

		let mut tx = market.storage.transaction().await.unwrap();
		assert!(catalog
			.decrement_stock(&mut tx, &product.id, Decimal::from(2))
			.await
			.unwrap());
		assert!(!catalog
			.decrement_stock(&mut tx, &product.id, Decimal::from(2))
			.await
			.unwrap());
		catalog
			.increment_stock(&mut tx, &product.id, Decimal::new(5, 1))
			.await
			.unwrap();
		tx.commit().await.unwrap();

		let stock = catalog.get_product(&product.id).await.unwrap().unwrap().stock;
		assert_eq!(stock, Decimal::new(15, 1));
	}
}
