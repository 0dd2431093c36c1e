use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::OrderId;

/// Set of order ids that have already been alerted.
///
/// Persisted as a flat JSON array. Membership is what matters for dedup;
/// insertion order is kept so the stored file reads as an audit trail.
/// Entries are never removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<OrderId>", into = "Vec<OrderId>")]
pub struct AlertLedger {
    ids: Vec<OrderId>,
    index: HashSet<OrderId>,
}

impl AlertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.index.contains(id)
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, id: OrderId) -> bool {
        if !self.index.insert(id.clone()) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &OrderId> {
        self.ids.iter()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.ids)
    }

    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }

    /// True when every id in `self` is also in `other`
    pub fn is_subset(&self, other: &AlertLedger) -> bool {
        self.index.is_subset(&other.index)
    }
}

impl From<Vec<OrderId>> for AlertLedger {
    fn from(ids: Vec<OrderId>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<AlertLedger> for Vec<OrderId> {
    fn from(ledger: AlertLedger) -> Self {
        ledger.ids
    }
}

impl FromIterator<OrderId> for AlertLedger {
    fn from_iter<I: IntoIterator<Item = OrderId>>(iter: I) -> Self {
        let mut ledger = AlertLedger::new();
        for id in iter {
            ledger.insert(id);
        }
        ledger
    }
}

impl PartialEq for AlertLedger {
    /// Set equality, order-insensitive
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for AlertLedger {}
