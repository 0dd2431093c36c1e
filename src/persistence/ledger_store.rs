//! Alert ledger persistence
//!
//! The ledger is a single JSON array object. It is read once at the start of
//! a cycle and overwritten in full once at the end; there is no append log.

use std::sync::Arc;
use tracing::{debug, info};

use super::BlobStore;
use crate::domain::AlertLedger;
use crate::error::{Result, WatchError};

const LEDGER_CONTENT_TYPE: &str = "application/json";

/// Loads and checkpoints the alert ledger through a [`BlobStore`]
#[derive(Clone)]
pub struct LedgerStore {
    store: Arc<dyn BlobStore>,
    object_name: String,
}

impl LedgerStore {
    pub fn new(store: Arc<dyn BlobStore>, object_name: &str) -> Self {
        Self {
            store,
            object_name: object_name.to_string(),
        }
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Read the persisted ledger.
    ///
    /// A missing object is the first-run case and yields an empty ledger.
    /// Any other failure is `WatchError::LedgerRead`.
    pub async fn load(&self) -> Result<AlertLedger> {
        info!("Loading alerted orders from {}", self.object_name);

        let exists = self
            .store
            .exists(&self.object_name)
            .await
            .map_err(|e| WatchError::LedgerRead(e.to_string()))?;
        if !exists {
            info!("No alert ledger found, starting empty");
            return Ok(AlertLedger::new());
        }

        let data = self
            .store
            .download(&self.object_name)
            .await
            .map_err(|e| WatchError::LedgerRead(e.to_string()))?;

        let ledger = AlertLedger::from_json(&data).map_err(|e| {
            WatchError::LedgerRead(format!("{} is not a JSON id list: {}", self.object_name, e))
        })?;
        debug!("Loaded {} alerted order ids", ledger.len());
        Ok(ledger)
    }

    /// Overwrite the persisted ledger with `ledger`
    pub async fn save(&self, ledger: &AlertLedger) -> Result<()> {
        info!("Saving {} alerted orders to {}", ledger.len(), self.object_name);

        let data = ledger
            .to_json()
            .map_err(|e| WatchError::LedgerWrite(e.to_string()))?;

        self.store
            .upload(&self.object_name, data, LEDGER_CONTENT_TYPE)
            .await
            .map_err(|e| WatchError::LedgerWrite(e.to_string()))?;

        info!("Alerted orders saved successfully");
        Ok(())
    }
}
