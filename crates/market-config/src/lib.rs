//! Configuration for the marketplace service.
//!
//! Configuration is read from TOML. String values may reference environment
//! variables as `${NAME}` or `${NAME:-fallback}`, and a file may pull in other
//! files with `include = ["storage.toml", ...]`. A top-level section may only
//! be defined once across all included files.

mod loader;

pub use loader::ConfigLoader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The default Display dumps the whole input; keep only the message.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub market: MarketConfig,
	pub storage: StorageConfig,
	pub pricing: PricingConfig,
	#[serde(default)]
	pub orders: OrdersConfig,
	pub api: Option<ApiConfig>,
}

/// Identity of this marketplace instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
	pub id: String,
}

/// Storage backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Name of the implementation to use; must be a key of `implementations`.
	pub primary: String,
	/// Implementation name to its raw configuration table.
	pub implementations: HashMap<String, toml::Value>,
	/// Longest wait for the store-wide writer lock before a write is rejected
	/// as a retryable conflict.
	#[serde(default = "default_lock_timeout_ms")]
	pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
	5000
}

/// Delivery fee calculator selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Order numbering and listing defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Leading segment of every order number, e.g. `KIB` in `KIB-20240101-4F7Q2Z`.
	#[serde(default = "default_number_prefix")]
	pub number_prefix: String,
	#[serde(default = "default_page_size")]
	pub default_page_size: u32,
	#[serde(default = "default_max_page_size")]
	pub max_page_size: u32,
	/// Draws allowed when a generated order number collides.
	#[serde(default = "default_number_attempts")]
	pub number_attempts: u32,
}

impl Default for OrdersConfig {
	fn default() -> Self {
		Self {
			number_prefix: default_number_prefix(),
			default_page_size: default_page_size(),
			max_page_size: default_max_page_size(),
			number_attempts: default_number_attempts(),
		}
	}
}

fn default_number_prefix() -> String {
	"KIB".to_string()
}

fn default_page_size() -> u32 {
	20
}

fn default_max_page_size() -> u32 {
	100
}

fn default_number_attempts() -> u32 {
	5
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
}

/// CORS configuration. An origin of `*` allows any origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Replaces `${NAME}` and `${NAME:-fallback}` with environment values.
///
/// Fails on a referenced variable that is unset and has no fallback.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Bounded input keeps the regex scan cheap on hostile files.
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut output = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(fallback)) => fallback.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		output.push_str(&input[last..whole.start()]);
		output.push_str(&value);
		last = whole.end();
	}
	output.push_str(&input[last..]);

	Ok(output)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;

		ConfigLoader::new(base_dir).load_config(file_name).await
	}

	/// Storage lock timeout as a [`std::time::Duration`].
	pub fn lock_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.storage.lock_timeout_ms)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.market.id.trim().is_empty() {
			return Err(ConfigError::Validation("Market ID cannot be empty".into()));
		}

		check_primary("storage", &self.storage.primary, &self.storage.implementations)?;
		if !(1..=60_000).contains(&self.storage.lock_timeout_ms) {
			return Err(ConfigError::Validation(
				"storage.lock_timeout_ms must be between 1 and 60000".into(),
			));
		}

		check_primary("pricing", &self.pricing.primary, &self.pricing.implementations)?;

		let orders = &self.orders;
		let prefix_len = orders.number_prefix.len();
		if !(1..=8).contains(&prefix_len)
			|| !orders
				.number_prefix
				.chars()
				.all(|c| c.is_ascii_alphanumeric())
		{
			return Err(ConfigError::Validation(
				"orders.number_prefix must be 1 to 8 ASCII letters or digits".into(),
			));
		}
		if orders.max_page_size == 0 {
			return Err(ConfigError::Validation(
				"orders.max_page_size must be at least 1".into(),
			));
		}
		if orders.default_page_size == 0 || orders.default_page_size > orders.max_page_size {
			return Err(ConfigError::Validation(format!(
				"orders.default_page_size must be between 1 and {}",
				orders.max_page_size
			)));
		}
		if orders.number_attempts == 0 {
			return Err(ConfigError::Validation(
				"orders.number_attempts must be at least 1".into(),
			));
		}

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be greater than 0".into(),
				));
			}
			if api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"api.max_request_size must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

fn check_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a configuration string, resolving environment placeholders and
/// validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
