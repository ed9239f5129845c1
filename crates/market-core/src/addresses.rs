//! Per-user delivery addresses.
//!
//! All of a user's addresses live in one document, so the single-default
//! invariant is restored in the same write that could break it: whenever at
//! least one address exists, exactly one is the default.

use crate::access::require_authenticated;
use crate::MarketError;
use chrono::Utc;
use market_storage::{StorageService, StorageTransaction};
use market_types::{Actor, Address, AddressPatch, NewAddress, StorageKey};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

fn required(field: &str, value: String) -> Result<String, MarketError> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(MarketError::invalid(format!("{} must not be empty", field)));
	}
	Ok(trimmed.to_string())
}

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), MarketError> {
	if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
		return Err(MarketError::invalid("latitude must be within [-90, 90]"));
	}
	if longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
		return Err(MarketError::invalid("longitude must be within [-180, 180]"));
	}
	Ok(())
}

/// Makes `index` the only default.
fn make_default(addresses: &mut [Address], index: usize) {
	for (i, address) in addresses.iter_mut().enumerate() {
		address.is_default = i == index;
	}
}

/// Promotes the most recently created address, later entries winning ties,
/// when no default is left.
fn promote_if_needed(addresses: &mut [Address]) {
	if addresses.is_empty() || addresses.iter().any(|a| a.is_default) {
		return;
	}
	let newest = addresses
		.iter()
		.enumerate()
		.max_by_key(|(i, a)| (a.created_at, *i))
		.map(|(i, _)| i);
	if let Some(index) = newest {
		make_default(addresses, index);
	}
}

pub struct AddressBook {
	storage: Arc<StorageService>,
}

impl AddressBook {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	async fn load(&self, user_id: &str) -> Result<Vec<Address>, MarketError> {
		Ok(self
			.storage
			.retrieve_optional(StorageKey::Addresses, user_id)
			.await?
			.unwrap_or_default())
	}

	async fn load_in(
		&self,
		tx: &StorageTransaction<'_>,
		user_id: &str,
	) -> Result<Vec<Address>, MarketError> {
		Ok(tx
			.retrieve_optional(StorageKey::Addresses, user_id)
			.await?
			.unwrap_or_default())
	}

	fn save(
		&self,
		tx: &mut StorageTransaction<'_>,
		user_id: &str,
		addresses: &[Address],
	) -> Result<(), MarketError> {
		if addresses.is_empty() {
			tx.remove(StorageKey::Addresses, user_id);
		} else {
			tx.store(StorageKey::Addresses, user_id, &addresses)?;
		}
		Ok(())
	}

	/// The actor's addresses, default first, then newest first.
	pub async fn list_addresses(&self, actor: &Actor) -> Result<Vec<Address>, MarketError> {
		require_authenticated(actor)?;
		let mut addresses = self.load(&actor.id).await?;
		addresses.sort_by(|a, b| {
			b.is_default
				.cmp(&a.is_default)
				.then_with(|| b.created_at.cmp(&a.created_at))
		});
		Ok(addresses)
	}

	/// One of the actor's addresses. Other users' addresses are reported as
	/// missing.
	pub async fn get_address(&self, actor: &Actor, id: &str) -> Result<Address, MarketError> {
		require_authenticated(actor)?;
		self.lookup(&actor.id, id)
			.await?
			.ok_or_else(|| MarketError::not_found("Address"))
	}

	/// Address lookup without an actor, used to enrich orders.
	pub async fn lookup(&self, user_id: &str, id: &str) -> Result<Option<Address>, MarketError> {
		Ok(self.load(user_id).await?.into_iter().find(|a| a.id == id))
	}

	/// Address lookup inside the caller's transaction.
	pub async fn find_in(
		&self,
		tx: &StorageTransaction<'_>,
		user_id: &str,
		id: &str,
	) -> Result<Option<Address>, MarketError> {
		Ok(self.load_in(tx, user_id).await?.into_iter().find(|a| a.id == id))
	}

	pub async fn create_address(
		&self,
		actor: &Actor,
		input: NewAddress,
	) -> Result<Address, MarketError> {
		require_authenticated(actor)?;
		let label = required("label", input.label)?;
		let full_address = required("fullAddress", input.full_address)?;
		let city = required("city", input.city)?;
		check_coordinates(input.latitude, input.longitude)?;

		let mut tx = self.storage.transaction().await?;
		let mut addresses = self.load_in(&tx, &actor.id).await?;

		let address = Address {
			id: Uuid::new_v4().to_string(),
			user_id: actor.id.clone(),
			label,
			full_address,
			city,
			quarter: input.quarter.filter(|q| !q.trim().is_empty()),
			latitude: input.latitude,
			longitude: input.longitude,
			is_default: false,
			created_at: Utc::now(),
		};
		addresses.push(address);
		let index = addresses.len() - 1;
		if input.is_default || index == 0 {
			make_default(&mut addresses, index);
		}

		self.save(&mut tx, &actor.id, &addresses)?;
		tx.commit().await?;
		debug!(addresses = addresses.len(), "address created");
		Ok(addresses.swap_remove(index))
	}

	pub async fn update_address(
		&self,
		actor: &Actor,
		id: &str,
		patch: AddressPatch,
	) -> Result<Address, MarketError> {
		require_authenticated(actor)?;
		let mut tx = self.storage.transaction().await?;
		let mut addresses = self.load_in(&tx, &actor.id).await?;
		let index = addresses
			.iter()
			.position(|a| a.id == id)
			.ok_or_else(|| MarketError::not_found("Address"))?;

		{
			let address = &mut addresses[index];
			if let Some(label) = patch.label {
				address.label = required("label", label)?;
			}
			if let Some(full_address) = patch.full_address {
				address.full_address = required("fullAddress", full_address)?;
			}
			if let Some(city) = patch.city {
				address.city = required("city", city)?;
			}
			if let Some(quarter) = patch.quarter {
				address.quarter = Some(quarter).filter(|q| !q.trim().is_empty());
			}
			check_coordinates(patch.latitude, patch.longitude)?;
			if patch.latitude.is_some() {
				address.latitude = patch.latitude;
			}
			if patch.longitude.is_some() {
				address.longitude = patch.longitude;
			}
		}

		match patch.is_default {
			Some(true) => make_default(&mut addresses, index),
			Some(false) if addresses[index].is_default && addresses.len() > 1 => {
				addresses[index].is_default = false;
				let others: Vec<usize> = (0..addresses.len()).filter(|i| *i != index).collect();
				let newest = others
					.into_iter()
					.max_by_key(|i| (addresses[*i].created_at, *i));
				if let Some(other) = newest {
					make_default(&mut addresses, other);
				}
			},
			// The only address stays the default.
			_ => {},
		}

		self.save(&mut tx, &actor.id, &addresses)?;
		tx.commit().await?;
		Ok(addresses.swap_remove(index))
	}

	/// Deletes an address, promoting another one if it was the default.
	pub async fn delete_address(&self, actor: &Actor, id: &str) -> Result<(), MarketError> {
		require_authenticated(actor)?;
		let mut tx = self.storage.transaction().await?;
		let mut addresses = self.load_in(&tx, &actor.id).await?;
		let index = addresses
			.iter()
			.position(|a| a.id == id)
			.ok_or_else(|| MarketError::not_found("Address"))?;

		addresses.remove(index);
		promote_if_needed(&mut addresses);

		self.save(&mut tx, &actor.id, &addresses)?;
		tx.commit().await?;
		Ok(())
	}

	pub async fn set_default_address(
		&self,
		actor: &Actor,
		id: &str,
	) -> Result<Address, MarketError> {
		require_authenticated(actor)?;
		let mut tx = self.storage.transaction().await?;
		let mut addresses = self.load_in(&tx, &actor.id).await?;
		let index = addresses
			.iter()
			.position(|a| a.id == id)
			.ok_or_else(|| MarketError::not_found("Address"))?;

		make_default(&mut addresses, index);
		self.save(&mut tx, &actor.id, &addresses)?;
		tx.commit().await?;
		Ok(addresses.swap_remove(index))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{client, new_address, TestMarket};

	async fn default_count(book: &AddressBook, actor: &Actor) -> usize {
		book.list_addresses(actor)
			.await
			.unwrap()
			.iter()
			.filter(|a| a.is_default)
			.count()
	}

	#[tokio::test]
	async fn test_first_address_is_forced_default() {
		let market = TestMarket::new().await;
		let book = market.engine.addresses();
		let user = client("c-1");

		let first = book.create_address(&user, new_address("Maison", "Douala")).await.unwrap();
		assert!(first.is_default);

		let second = book.create_address(&user, new_address("Bureau", "Douala")).await.unwrap();
		assert!(!second.is_default);

		let mut third = new_address("Marché", "Yaoundé");
		third.is_default = true;
		let third = book.create_address(&user, third).await.unwrap();
		assert!(third.is_default);
		assert_eq!(default_count(book, &user).await, 1);

		let listed = book.list_addresses(&user).await.unwrap();
		assert_eq!(listed[0].id, third.id);
	}

	#[tokio::test]
	async fn test_single_default_across_operations() {
		let market = TestMarket::new().await;
		let book = market.engine.addresses();
		let user = client("c-1");

		let a = book.create_address(&user, new_address("A", "Douala")).await.unwrap();
		let b = book.create_address(&user, new_address("B", "Douala")).await.unwrap();
		let c = book.create_address(&user, new_address("C", "Douala")).await.unwrap();

		book.set_default_address(&user, &b.id).await.unwrap();
		assert_eq!(default_count(book, &user).await, 1);

		book.delete_address(&user, &b.id).await.unwrap();
		assert_eq!(default_count(book, &user).await, 1);
		let promoted = book.list_addresses(&user).await.unwrap();
		assert_eq!(promoted[0].id, c.id);

		book.delete_address(&user, &a.id).await.unwrap();
		book.update_address(
			&user,
			&c.id,
			AddressPatch {
				is_default: Some(false),
				..AddressPatch::default()
			},
		)
		.await
		.unwrap();
		assert_eq!(default_count(book, &user).await, 1);

		book.delete_address(&user, &c.id).await.unwrap();
		assert!(book.list_addresses(&user).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_other_users_cannot_touch_addresses() {
		let market = TestMarket::new().await;
		let book = market.engine.addresses();
		let owner = client("c-1");
		let stranger = client("c-2");

		let address = book.create_address(&owner, new_address("A", "Douala")).await.unwrap();
		assert!(matches!(
			book.get_address(&stranger, &address.id).await,
			Err(MarketError::NotFound(_))
		));
		assert!(matches!(
			book.delete_address(&stranger, &address.id).await,
			Err(MarketError::NotFound(_))
		));
		assert!(matches!(
			book.set_default_address(&stranger, &address.id).await,
			Err(MarketError::NotFound(_))
		));
		assert!(book.get_address(&owner, &address.id).await.is_ok());
	}

	#[tokio::test]
	async fn test_validation() {
		let market = TestMarket::new().await;
		let book = market.engine.addresses();
		let user = client("c-1");

		let mut input = new_address("A", "Douala");
		input.city = "  ".into();
		assert!(matches!(
			book.create_address(&user, input).await,
			Err(MarketError::ValidationFailed(_))
		));

		let mut input = new_address("A", "Douala");
		input.latitude = Some(120.0);
		assert!(matches!(
			book.create_address(&user, input).await,
			Err(MarketError::ValidationFailed(_))
		));
	}
}
