//! KnowGraph Store — graph persistence with a remote primary and local fallback.
//!
//! `StorageCoordinator` is the single entry point callers use. It routes each
//! operation to `RemoteStore` or `LocalStore` depending on the current
//! `StorageMode`, falls back to local storage when the backend is unreachable,
//! and runs an `AvailabilityProbe` to switch back once it recovers.

pub mod coordinator;
pub mod kv;
pub mod local;
pub mod probe;
pub mod remote;
pub mod transfer;

pub use coordinator::{Notice, Outcome, StorageCoordinator, StorageMode};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use local::LocalStore;
pub use probe::AvailabilityProbe;
pub use remote::RemoteStore;
