//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable module (storage backends, fee calculators) exposes a
/// `Registry` struct implementing this trait so the service binary can map
/// configuration names to factory functions without hard-coding them.
pub trait ImplementationRegistry {
	/// Name used in configuration files, e.g. `memory` for
	/// `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// Factory function type provided by the implementation.
	type Factory;

	/// Returns the factory that builds this implementation from its
	/// configuration table.
	fn factory() -> Self::Factory;
}
