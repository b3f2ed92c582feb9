// ============================================================================
// PropMapDB Library
// ============================================================================

//! Entity-property persistence mapping.
//!
//! Object types are composed once, at startup, from fields and reusable
//! properties into immutable [`ObjectDefinition`]s; each instance carries a
//! private [`Payload`] addressed through the definition's slot map. Writes
//! go through a [`UnitOfWork`] that queues the triggers they fire and
//! propagates them in two waves around a single flush.
//!
//! ```
//! use propmapdb::prelude::*;
//!
//! # fn main() -> propmapdb::Result<()> {
//! let registry = DefinitionRegistry::build(vec![
//!     ObjectDefinitionBuilder::new("customer", "crm")
//!         .property(PropertyDefinition::named())
//!         .field(FieldDefinition::text("city", "City", 40)),
//! ])?;
//! let mut storage = InMemoryStorage::new();
//! registry.provision(&mut storage)?;
//!
//! let mut acme = registry.get("customer")?.new_instance();
//! let config = EngineConfig::new();
//! UnitOfWork::run(&mut storage, &config, |uow| {
//!     acme.set_value(uow, "name", "ACME")?;
//!     uow.insert(&mut acme)
//! })?;
//!
//! assert_eq!(storage.row_count("customer")?, 1);
//! # Ok(())
//! # }
//! ```

pub mod choice;
pub mod config;
pub mod core;
pub mod element;
pub mod field;
pub mod loader;
pub mod object;
pub mod prelude;
pub mod property;
pub mod query;
pub mod storage;
pub mod trigger;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use core::{EngineError, Result, ValidationFailure, Value};
pub use object::{
    DefinitionRegistry, ObjectDefinition, ObjectDefinitionBuilder, ObjectId, ObjectInstance, Payload,
};
pub use storage::{InMemoryStorage, QueryEngine, StorageEngine};
pub use trigger::{TriggerDefinition, TriggerKind, TriggerReport, UnitOfWork};
