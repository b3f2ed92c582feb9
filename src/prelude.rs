//! Recommended imports grouped by abstraction level.
//!
//! A glob import covers composing object types, mutating instances inside
//! a unit of work and flat-file round trips. `advanced` is an explicit
//! escape hatch for schema, storage and query internals.

pub use crate::choice::{ChoiceDefinition, ChoiceValue, TransitionChoiceDefinition};
pub use crate::config::EngineConfig;
pub use crate::core::{EngineError, Result, ValidationFailure, Value};
pub use crate::field::{EncryptionMode, FieldDefinition, FieldInstance, ReversibleCipher, TimePeriod};
pub use crate::loader::{LoaderCell, LoaderFieldSample, LoaderMode};
pub use crate::object::{
    ChoiceRef, DefinitionRegistry, DisplayProfile, ElementPayload, MultiFieldConstraint,
    ObjectDefinition, ObjectDefinitionBuilder, ObjectId, ObjectInstance, SimpleDataElement,
};
pub use crate::property::{
    ExternalFieldDefinition, JoinQueryConditionDefinition, PropertyDefinition,
};
pub use crate::storage::{InMemoryStorage, QueryEngine, StorageEngine};
pub use crate::trigger::{TriggerDefinition, TriggerKind, TriggerReport, UnitOfWork};

pub mod advanced {
    //! Escape hatch for the layers under the object model.
    //!
    //! Application code should normally stay on the top-level prelude.
    pub use crate::core::{Column, ColumnKind, ID_COLUMN, IndexSchema, Row, TableSchema};
    pub use crate::element::ElementDefinition;
    pub use crate::object::{Payload, Slot, SlotInfo};
    pub use crate::query::{JoinKey, Query, QueryRow, ROOT_ALIAS};
    pub use crate::storage::{Table, provision};
}
