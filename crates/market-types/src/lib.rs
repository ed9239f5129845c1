//! Common types module for the marketplace order system.
//!
//! This crate defines the domain records (catalog, carts, addresses, orders),
//! the actor/role model, storage namespaces and the API error surface shared
//! by every other crate in the workspace.

/// Actor identity and roles supplied by the identity collaborator.
pub mod access;
/// Delivery addresses owned by users.
pub mod address;
/// API error and pagination types for the HTTP adapter.
pub mod api;
/// Cart lines.
pub mod cart;
/// Products, categories and images.
pub mod catalog;
/// Orders, order lines and their status enums.
pub mod order;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Small helpers shared across crates.
pub mod utils;
/// Configuration validation types for implementation-specific tables.
pub mod validation;

pub use access::*;
pub use address::*;
pub use api::*;
pub use cart::*;
pub use catalog::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::truncate_id;
pub use validation::*;

/// Currency amounts are integer minor units.
pub type Money = i64;
