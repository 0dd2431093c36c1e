//! Persistence Layer for Cross-Invocation State
//!
//! The alert ledger is the only state that survives between cycles:
//! - Blob store abstraction (GCS in production, memory in tests)
//! - Ledger store that loads and checkpoints the alerted-order set

pub mod blob_store;
pub mod ledger_store;

pub use blob_store::{BlobStore, MemoryBlobStore};
pub use ledger_store::LedgerStore;
