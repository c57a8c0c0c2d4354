//! Registry persistence adapters.

mod json_file;
mod memory;

pub use json_file::JsonFilePersistence;
pub use memory::InMemoryPersistence;
