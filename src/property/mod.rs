pub mod definition;
pub mod external;
pub mod instance;

pub use definition::{PARENT_COLUMN, PropertyDefinition, PropertyKind};
pub use external::{
    ExternalFieldByJoinQuery, ExternalFieldDefinition, ExternalFieldKind,
    JoinQueryConditionDefinition,
};
pub use instance::PropertyInstance;
