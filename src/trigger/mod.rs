//! Trigger propagation.
//!
//! Mutations register `(trigger, object)` pairs on the [`UnitOfWork`]
//! they run in. Propagation then drains the queue in two waves: internal
//! triggers first (including the ones they register themselves), one flush
//! of every buffered persisted object, then custom triggers. Internal
//! triggers registered while the custom wave runs are dropped and reported.

pub mod definition;
pub mod unit_of_work;

pub use definition::{TriggerAction, TriggerDefinition, TriggerKind};
pub use unit_of_work::{TriggerReport, UnitOfWork};
