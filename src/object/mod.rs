//! Object definitions and their instances.
//!
//! An [`ObjectDefinitionBuilder`] collects fields, properties, triggers,
//! display profiles, constraints and loader aliases. The
//! [`DefinitionRegistry`] freezes builders into immutable
//! [`ObjectDefinition`]s in three passes (own fields, properties, then
//! external fields and trigger wiring against the frozen graph) and shares
//! them through `Arc`. Each [`ObjectInstance`] owns a private [`Payload`]
//! addressed through the definition's name to slot map.

pub mod builder;
pub mod constraint;
pub mod definition;
pub mod display;
pub mod instance;
pub mod registry;

pub use builder::{ID_COLUMN_LEN, ObjectDefinitionBuilder};
pub use constraint::MultiFieldConstraint;
pub use definition::{ObjectDefinition, Slot, SlotInfo};
pub use display::{ChoiceRef, DisplayProfile, ElementPayload, SimpleDataElement};
pub use instance::{ObjectId, ObjectInstance, Payload};
pub use registry::DefinitionRegistry;
