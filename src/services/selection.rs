//! Dedup & selection
//!
//! Decides which fetched orders are newly breaching and folds their ids into
//! the alert ledger. Pure and synchronous; all I/O happens around it.

use crate::domain::{AlertLedger, Order};

/// Outcome of one selection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Orders to notify, in order of first appearance upstream
    pub selected: Vec<Order>,
    /// Input ledger plus the ids of `selected`
    pub ledger: AlertLedger,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Pick unfulfilled orders that are not yet in `ledger`.
///
/// Every selected id is absent from the input ledger and present in the
/// returned one. The returned ledger is a superset of the input. An id that
/// shows up twice in `fetched` is selected once.
pub fn select(fetched: &[Order], ledger: &AlertLedger) -> Selection {
    let mut updated = ledger.clone();
    let mut selected = Vec::new();

    for order in fetched {
        if !order.is_unfulfilled() || ledger.contains(&order.id) {
            continue;
        }
        if updated.insert(order.id.clone()) {
            selected.push(order.clone());
        }
    }

    Selection {
        selected,
        ledger: updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderId;
    use chrono::{DateTime, FixedOffset};

    fn order(id: &str, status: &str) -> Order {
        let created: DateTime<FixedOffset> =
            DateTime::parse_from_rfc3339("2024-03-01T09:30:00+00:00").unwrap();
        let status = if status.is_empty() { None } else { Some(status) };
        Order::new(id, created, status)
    }

    fn ledger(ids: &[&str]) -> AlertLedger {
        ids.iter().map(|id| OrderId::from(*id)).collect()
    }

    fn ids(orders: &[Order]) -> Vec<&str> {
        orders.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_first_alert_skips_fulfilled_orders() {
        let fetched = vec![order("1001", ""), order("1002", "fulfilled")];
        let result = select(&fetched, &AlertLedger::new());

        assert_eq!(ids(&result.selected), vec!["1001"]);
        assert_eq!(result.ledger, ledger(&["1001"]));
    }

    #[test]
    fn test_already_alerted_order_is_skipped() {
        let fetched = vec![order("1001", "")];
        let result = select(&fetched, &ledger(&["1001"]));

        assert!(result.is_empty());
        assert_eq!(result.ledger, ledger(&["1001"]));
    }

    #[test]
    fn test_new_breach_keeps_upstream_order() {
        let fetched = vec![order("2001", ""), order("2002", "")];
        let result = select(&fetched, &ledger(&["2001"]));

        assert_eq!(ids(&result.selected), vec!["2002"]);
        assert_eq!(result.ledger, ledger(&["2001", "2002"]));
        let stored: Vec<&str> = result.ledger.iter().map(OrderId::as_str).collect();
        assert_eq!(stored, vec!["2001", "2002"]);
    }

    #[test]
    fn test_selection_is_idempotent() {
        let fetched = vec![
            order("3001", ""),
            order("3002", "partial"),
            order("3003", ""),
            order("3004", ""),
        ];
        let start = ledger(&["3004", "9999"]);

        let first = select(&fetched, &start);
        let second = select(&fetched, &first.ledger);

        assert_eq!(ids(&first.selected), vec!["3001", "3003"]);
        assert!(second.is_empty());
        assert_eq!(second.ledger, first.ledger);
    }

    #[test]
    fn test_ledger_only_grows() {
        let start = ledger(&["1", "2", "3"]);
        let result = select(&[order("4", ""), order("2", "")], &start);

        assert!(start.is_subset(&result.ledger));
        assert_eq!(result.ledger.len(), 4);
    }

    #[test]
    fn test_selected_iff_unfulfilled_and_unseen() {
        let fetched = vec![
            order("a", ""),
            order("b", "fulfilled"),
            order("c", ""),
            order("d", "restocked"),
        ];
        let start = ledger(&["c", "d"]);
        let result = select(&fetched, &start);

        for o in &fetched {
            let expected = o.is_unfulfilled() && !start.contains(&o.id);
            let actual = result.selected.iter().any(|s| s.id == o.id);
            assert_eq!(expected, actual, "order {}", o.id);
            if actual {
                assert!(result.ledger.contains(&o.id));
            }
        }
    }

    #[test]
    fn test_duplicate_ids_in_one_response_selected_once() {
        let fetched = vec![order("5001", ""), order("5001", "")];
        let result = select(&fetched, &AlertLedger::new());

        assert_eq!(ids(&result.selected), vec!["5001"]);
    }

    #[test]
    fn test_empty_fetch_leaves_ledger_unchanged() {
        let start = ledger(&["7001"]);
        let result = select(&[], &start);

        assert!(result.is_empty());
        assert_eq!(result.ledger, start);
    }
}
