pub mod decimal;
pub mod definition;
pub mod encrypted;
pub mod instance;
pub mod multi_choice;
pub mod period;
pub mod text;

pub use definition::{FieldDefinition, FieldKind, MAX_PRIORITY, MIN_PRIORITY};
pub use encrypted::{EncryptionMode, ReversibleCipher};
pub use instance::FieldInstance;
pub use period::{PeriodPart, TimePeriod};
