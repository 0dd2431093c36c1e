pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod secrets;
pub mod services;
pub mod traits;

pub use config::AppConfig;
pub use domain::{AlertLedger, AlertMessage, Order, OrderId};
pub use error::{ErrorKind, Result, WatchError};
pub use persistence::{BlobStore, LedgerStore, MemoryBlobStore};
pub use secrets::{SecretProvider, Secrets};
pub use services::{
    run_once, select, CheckStatus, CycleReport, CycleRunner, CycleStage, Notifier, RunOptions,
    Selection, TriggerServer,
};
pub use traits::{NotificationChannel, OrderSource};
