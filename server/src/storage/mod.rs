mod backend;
mod config;
mod error;
mod metadata;
mod traits;


pub use backend::ObjectStoreBackend;
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use traits::{ConfigStorage, ItemDraft};
