//! File-based storage backend.
//!
//! Each key lives in its own `<encoded key>.bin` file under the storage
//! directory. Single writes go through a temp file and a rename. Batches are
//! first written to `journal.json`; if the process dies halfway through
//! applying one, the journal is replayed the next time the directory is
//! opened. A batch that fails while running is replayed from the journal
//! straight away; if that also fails, the backend refuses every operation
//! until a later replay succeeds. An exclusive lock on `.lock` keeps a second
//! process out of the same directory.

use crate::{BatchOp, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use market_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const DATA_EXTENSION: &str = "bin";
const JOURNAL_FILE: &str = "journal.json";
const LOCK_FILE: &str = ".lock";

fn backend_err(e: impl std::fmt::Display) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Maps a key to a file stem. Bytes outside `[A-Za-z0-9_-]` become `%XX`,
/// so distinct keys never share a file.
fn encode_key(key: &str) -> String {
	let mut out = String::with_capacity(key.len());
	for byte in key.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
			out.push(byte as char);
		} else {
			out.push_str(&format!("%{:02X}", byte));
		}
	}
	out
}

fn decode_key(stem: &str) -> Option<String> {
	let bytes = stem.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let hex = stem.get(i + 1..i + 3)?;
			out.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(out).ok()
}

/// Storage directory holding one file per key.
pub struct FileStorage {
	base_path: PathBuf,
	/// Held for the lifetime of the backend; the OS lock drops with it.
	_lock: File,
	/// Serializes batches and journal replays so only one journal exists at
	/// a time.
	batch: Mutex<()>,
	/// Set when a batch could neither be applied nor replayed.
	failed: AtomicBool,
}

impl FileStorage {
	/// Opens (creating if needed) a storage directory.
	///
	/// Fails with [`StorageError::Configuration`] when another process holds
	/// the directory. Replays an interrupted batch if one is found.
	pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let base_path = base_path.into();
		std::fs::create_dir_all(&base_path).map_err(backend_err)?;

		let lock = std::fs::OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(base_path.join(LOCK_FILE))
			.map_err(backend_err)?;
		lock.try_lock_exclusive().map_err(|e| {
			StorageError::Configuration(format!(
				"storage directory {} is in use: {}",
				base_path.display(),
				e
			))
		})?;

		let storage = Self {
			base_path,
			_lock: lock,
			batch: Mutex::new(()),
			failed: AtomicBool::new(false),
		};
		storage.replay_journal()?;
		Ok(storage)
	}

	fn file_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}", encode_key(key), DATA_EXTENSION))
	}

	fn journal_path(&self) -> PathBuf {
		self.base_path.join(JOURNAL_FILE)
	}

	/// Re-applies a batch whose application was interrupted. Every operation
	/// is idempotent, so running a partially applied batch again is safe.
	fn replay_journal(&self) -> Result<(), StorageError> {
		let journal = self.journal_path();
		let data = match std::fs::read(&journal) {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
			Err(e) => return Err(backend_err(e)),
		};
		let ops: Vec<BatchOp> = serde_json::from_slice(&data)
			.map_err(|e| StorageError::Serialization(format!("corrupt journal: {}", e)))?;

		warn!(
			component = "storage",
			operations = ops.len(),
			"replaying interrupted storage batch"
		);
		for op in &ops {
			let path = self.file_path(op.key());
			match op {
				BatchOp::Put { value, .. } => {
					let tmp = path.with_extension("tmp");
					std::fs::write(&tmp, value).map_err(backend_err)?;
					std::fs::rename(&tmp, &path).map_err(backend_err)?;
				},
				BatchOp::Delete { .. } => match std::fs::remove_file(&path) {
					Ok(()) => {},
					Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
					Err(e) => return Err(backend_err(e)),
				},
			}
		}
		std::fs::remove_file(&journal).map_err(backend_err)?;
		info!(component = "storage", "storage journal replayed");
		Ok(())
	}

	/// Replays the pending journal if an earlier batch left the directory
	/// half applied. Callers must hold the batch lock.
	fn recover_locked(&self) -> Result<(), StorageError> {
		if !self.failed.load(Ordering::Acquire) {
			return Ok(());
		}
		self.replay_journal()?;
		self.failed.store(false, Ordering::Release);
		Ok(())
	}

	async fn ensure_consistent(&self) -> Result<(), StorageError> {
		if !self.failed.load(Ordering::Acquire) {
			return Ok(());
		}
		let _batch = self.batch.lock().await;
		self.recover_locked()
	}

	async fn apply_ops(&self, ops: &[BatchOp]) -> Result<(), StorageError> {
		for op in ops {
			let path = self.file_path(op.key());
			match op {
				BatchOp::Put { value, .. } => write_atomic(&path, value).await?,
				BatchOp::Delete { .. } => remove_if_present(&path).await?,
			}
		}
		Ok(())
	}
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
	let tmp = path.with_extension("tmp");
	fs::write(&tmp, data).await.map_err(backend_err)?;
	fs::rename(&tmp, path).await.map_err(backend_err)
}

async fn remove_if_present(path: &Path) -> Result<(), StorageError> {
	match fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(backend_err(e)),
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.ensure_consistent().await?;
		match fs::read(self.file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(backend_err(e)),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.ensure_consistent().await?;
		write_atomic(&self.file_path(key), &value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.ensure_consistent().await?;
		remove_if_present(&self.file_path(key)).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.ensure_consistent().await?;
		fs::try_exists(self.file_path(key)).await.map_err(backend_err)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		self.ensure_consistent().await?;
		let mut entries = fs::read_dir(&self.base_path).await.map_err(backend_err)?;
		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_err)? {
			let path = entry.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some(DATA_EXTENSION) {
				continue;
			}
			let Some(key) = path
				.file_stem()
				.and_then(|stem| stem.to_str())
				.and_then(decode_key)
			else {
				continue;
			};
			if key.starts_with(prefix) {
				keys.push(key);
			}
		}
		keys.sort();
		Ok(keys)
	}

	async fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
		let _batch = self.batch.lock().await;
		self.recover_locked()?;

		let journal = serde_json::to_vec(&ops)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		write_atomic(&self.journal_path(), &journal).await?;

		if let Err(e) = self.apply_ops(&ops).await {
			warn!(
				component = "storage",
				error = %e,
				"storage batch failed, replaying journal"
			);
			if let Err(replay) = self.replay_journal() {
				self.failed.store(true, Ordering::Release);
				error!(
					component = "storage",
					error = %replay,
					"storage batch left pending, refusing operations until replayed"
				);
				return Err(e);
			}
			return Ok(());
		}

		fs::remove_file(self.journal_path())
			.await
			.map_err(backend_err)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Optional `storage_path`, a non-empty string.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("storage_path must not be empty".into()),
				}
			})],
		);
		schema.validate(config)
	}
}

/// Factory for the file backend.
///
/// Configuration parameters:
/// - `storage_path`: directory for data files (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::open(storage_path)?))
}

/// Registry entry for the file backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
