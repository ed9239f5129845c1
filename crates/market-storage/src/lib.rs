//! Storage module for the marketplace.
//!
//! Backends implement a small byte-oriented key/value interface with one
//! extra requirement: [`StorageInterface::apply_batch`] must apply a group of
//! writes all-or-nothing. [`StorageService`] layers JSON (de)serialization,
//! namespaced keys and a store-wide writer lock on top of it. Every mutation
//! goes through a [`StorageTransaction`], which buffers writes, lets the
//! holder read its own writes, and commits them as a single batch.

use async_trait::async_trait;
use market_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The writer lock could not be acquired in time.
	#[error("Timed out after {0:?} waiting for the storage writer lock")]
	Timeout(Duration),
}

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
	Put { key: String, value: Vec<u8> },
	Delete { key: String },
}

impl BatchOp {
	pub fn key(&self) -> &str {
		match self {
			BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
		}
	}
}

/// Low-level interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value for `key`; deleting a missing key succeeds.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key starting with `prefix`, sorted.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Applies all operations or none of them.
	async fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Builds a backend from its `[storage.implementations.<name>]` table.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Default wait for the writer lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

fn make_key(namespace: StorageKey, id: &str) -> String {
	format!("{}:{}", namespace.as_str(), id)
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Typed storage over a backend, with serialized writers.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
	writer: Mutex<()>,
	lock_timeout: Duration,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend,
			writer: Mutex::new(()),
			lock_timeout: DEFAULT_LOCK_TIMEOUT,
		}
	}

	/// Sets how long [`StorageService::transaction`] waits for the writer lock.
	pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
		self.lock_timeout = timeout;
		self
	}

	/// Starts a write transaction.
	///
	/// Only one transaction is open at a time across the whole store. Fails
	/// with [`StorageError::Timeout`] when the lock is not obtained within the
	/// configured timeout.
	pub async fn transaction(&self) -> Result<StorageTransaction<'_>, StorageError> {
		let guard = tokio::time::timeout(self.lock_timeout, self.writer.lock())
			.await
			.map_err(|_| StorageError::Timeout(self.lock_timeout))?;

		Ok(StorageTransaction {
			service: self,
			_guard: guard,
			writes: BTreeMap::new(),
		})
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&make_key(namespace, id)).await?;
		decode(&bytes)
	}

	/// Like [`StorageService::retrieve`] but maps a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: StorageKey, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&make_key(namespace, id)).await
	}

	/// Loads every value in a namespace, ordered by key.
	pub async fn list<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
	) -> Result<Vec<T>, StorageError> {
		let prefix = make_key(namespace, "");
		let mut values = Vec::new();
		for key in self.backend.list_keys(&prefix).await? {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => values.push(decode(&bytes)?),
				// Deleted between listing and reading.
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Stores a single value in its own transaction.
	pub async fn store<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let mut tx = self.transaction().await?;
		tx.store(namespace, id, data)?;
		tx.commit().await
	}

	/// Removes a single value in its own transaction.
	pub async fn remove(&self, namespace: StorageKey, id: &str) -> Result<(), StorageError> {
		let mut tx = self.transaction().await?;
		tx.remove(namespace, id);
		tx.commit().await
	}
}

/// Exclusive write scope over a [`StorageService`].
///
/// Writes are buffered until [`StorageTransaction::commit`]. Dropping the
/// transaction without committing discards them.
pub struct StorageTransaction<'a> {
	service: &'a StorageService,
	_guard: MutexGuard<'a, ()>,
	/// Pending writes; `None` marks a deletion.
	writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl StorageTransaction<'_> {
	async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		if let Some(pending) = self.writes.get(key) {
			return Ok(pending.clone());
		}
		match self.service.backend.get_bytes(key).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Reads a value, seeing this transaction's own pending writes.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		self.retrieve_optional(namespace, id)
			.await?
			.ok_or(StorageError::NotFound)
	}

	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		self.read_bytes(&make_key(namespace, id))
			.await?
			.map(|bytes| decode(&bytes))
			.transpose()
	}

	pub async fn exists(&self, namespace: StorageKey, id: &str) -> Result<bool, StorageError> {
		Ok(self.read_bytes(&make_key(namespace, id)).await?.is_some())
	}

	/// Loads every value in a namespace including pending writes, ordered by key.
	pub async fn list<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
	) -> Result<Vec<T>, StorageError> {
		let prefix = make_key(namespace, "");
		let mut keys: Vec<String> = self.service.backend.list_keys(&prefix).await?;
		keys.extend(
			self.writes
				.keys()
				.filter(|key| key.starts_with(&prefix))
				.cloned(),
		);
		keys.sort();
		keys.dedup();

		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			if let Some(bytes) = self.read_bytes(&key).await? {
				values.push(decode(&bytes)?);
			}
		}
		Ok(values)
	}

	/// Buffers a write. Serialization happens immediately so errors surface
	/// before commit.
	pub fn store<T: Serialize>(
		&mut self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.writes.insert(make_key(namespace, id), Some(encode(data)?));
		Ok(())
	}

	/// Buffers a deletion.
	pub fn remove(&mut self, namespace: StorageKey, id: &str) {
		self.writes.insert(make_key(namespace, id), None);
	}

	/// Number of buffered writes.
	pub fn pending(&self) -> usize {
		self.writes.len()
	}

	/// Applies every buffered write as one atomic batch and releases the lock.
	pub async fn commit(mut self) -> Result<(), StorageError> {
		let writes = std::mem::take(&mut self.writes);
		if writes.is_empty() {
			return Ok(());
		}
		let ops: Vec<BatchOp> = writes
			.into_iter()
			.map(|(key, value)| match value {
				Some(value) => BatchOp::Put { key, value },
				None => BatchOp::Delete { key },
			})
			.collect();
		debug!(operations = ops.len(), "committing storage batch");
		self.service.backend.apply_batch(ops).await
	}
}

impl Drop for StorageTransaction<'_> {
	fn drop(&mut self) {
		if !self.writes.is_empty() {
			debug!(
				discarded = self.writes.len(),
				"storage transaction dropped without commit"
			);
		}
	}
}
