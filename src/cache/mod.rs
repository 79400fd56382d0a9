//! Reload-safe storage for the widget's last document and result.

pub mod session;
pub mod store;

pub use session::SessionCache;
pub use store::{KeyValueStore, MemoryStore, StorageError, WebStorage};
