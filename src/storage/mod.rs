pub mod engine;
pub mod memory;
pub mod provision;
pub mod table;

pub use engine::{QueryEngine, StorageEngine};
pub use memory::InMemoryStorage;
pub use provision::provision;
pub use table::Table;
