use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Store-assigned order identifier, the dedup key of the alert ledger.
///
/// Upstream payloads and older ledger files carry it as a JSON number, newer
/// ledger files as a string; both deserialize to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct OrderId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl From<RawId> for OrderId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => OrderId(n.to_string()),
            RawId::Text(s) => OrderId(s.trim().to_string()),
        }
    }
}

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        OrderId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        OrderId::new(s)
    }
}

impl From<u64> for OrderId {
    fn from(n: u64) -> Self {
        OrderId(n.to_string())
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order as returned by the order source, read-only downstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<FixedOffset>,
    /// `None` or empty means unfulfilled
    pub fulfillment_status: Option<String>,
}

impl Order {
    pub fn new(
        id: impl Into<OrderId>,
        created_at: DateTime<FixedOffset>,
        fulfillment_status: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            fulfillment_status: fulfillment_status.map(str::to_string),
        }
    }

    pub fn is_unfulfilled(&self) -> bool {
        self.fulfillment_status
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    }
}

/// Order entry in the upstream `orders.json` payload.
///
/// Fields are loose so one bad record does not reject the whole page;
/// [`OrderRecord::into_order`] decides per record.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    #[serde(default)]
    pub id: Option<OrderId>,
    #[serde(default)]
    pub order_number: Option<OrderId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
}

impl OrderRecord {
    /// Prefer the human-facing order number, fall back to the resource id.
    ///
    /// Records without an id or with a missing or unparseable `created_at`
    /// are rejected with the reason.
    pub fn into_order(self) -> std::result::Result<Order, String> {
        let id = self
            .order_number
            .or(self.id)
            .ok_or_else(|| "no order_number or id".to_string())?;
        let raw = self
            .created_at
            .ok_or_else(|| format!("order {} has no created_at", id))?;
        let created_at = DateTime::parse_from_rfc3339(raw.trim())
            .map_err(|e| format!("order {} has invalid created_at {:?}: {}", id, raw, e))?;
        Ok(Order {
            id,
            created_at,
            fulfillment_status: self.fulfillment_status,
        })
    }
}

/// Top-level `orders.json` body. A missing `orders` field means no orders.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrdersPage {
    #[serde(default)]
    pub orders: Vec<OrderRecord>,
}
