//! Check cycle orchestration
//!
//! One cycle runs `FETCH -> SELECT -> NOTIFY -> PERSIST -> DONE`. Every stage
//! returns a `Result`; the runner decides per error kind whether to continue
//! with a default. Nothing after initialization aborts the cycle, so a report
//! is always produced.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::notifier::Notifier;
use super::selection::{select, Selection};
use crate::domain::{AlertLedger, OrderId};
use crate::error::{ErrorKind, WatchError};
use crate::persistence::LedgerStore;
use crate::traits::OrderSource;

/// Payload returned to whoever triggered the cycle
pub const CHECK_COMPLETE: &str = "Check complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleStage {
    Init,
    Fetch,
    Select,
    Notify,
    Persist,
    Done,
    /// Initialization failed; nothing else ran
    Failed,
}

impl std::fmt::Display for CycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleStage::Init => write!(f, "INIT"),
            CycleStage::Fetch => write!(f, "FETCH"),
            CycleStage::Select => write!(f, "SELECT"),
            CycleStage::Notify => write!(f, "NOTIFY"),
            CycleStage::Persist => write!(f, "PERSIST"),
            CycleStage::Done => write!(f, "DONE"),
            CycleStage::Failed => write!(f, "FAILED"),
        }
    }
}

/// A stage failure that was recovered from
#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    pub stage: CycleStage,
    pub kind: &'static str,
    pub message: String,
}

/// What happened during one cycle, for logs and tests
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub fetched: usize,
    pub selected: Vec<OrderId>,
    pub messages_delivered: usize,
    pub ledger_size: usize,
    pub ledger_persisted: bool,
    pub stage: CycleStage,
    pub failures: Vec<StageFailure>,
}

impl CycleReport {
    pub fn failed_in(&self, stage: CycleStage) -> Option<&StageFailure> {
        self.failures.iter().find(|f| f.stage == stage)
    }

    pub fn status(&self) -> CheckStatus {
        CheckStatus::complete()
    }
}

/// `{"status": "Check complete"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckStatus {
    pub status: String,
}

impl CheckStatus {
    pub fn complete() -> Self {
        Self {
            status: CHECK_COMPLETE.to_string(),
        }
    }
}

/// Runs check cycles against fixed collaborators
pub struct CycleRunner {
    source: Arc<dyn OrderSource>,
    ledger: Option<LedgerStore>,
    notifier: Notifier,
    threshold: chrono::Duration,
    persist: bool,
}

impl CycleRunner {
    /// `ledger: None` runs without dedup state; every breaching order is
    /// notified on every cycle.
    pub fn new(
        source: Arc<dyn OrderSource>,
        ledger: Option<LedgerStore>,
        notifier: Notifier,
        threshold: chrono::Duration,
    ) -> Self {
        Self {
            source,
            ledger,
            notifier,
            threshold,
            persist: true,
        }
    }

    /// Load the ledger but never write it back
    pub fn without_persist(mut self) -> Self {
        self.persist = false;
        self
    }

    pub async fn run(&self) -> CycleReport {
        self.run_at(Utc::now()).await
    }

    /// Run one cycle as if the current time were `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id);
        self.run_inner(cycle_id, now).instrument(span).await
    }

    async fn run_inner(&self, cycle_id: Uuid, now: DateTime<Utc>) -> CycleReport {
        let mut failures = Vec::new();

        // FETCH
        let (cutoff, fetched) = match now.checked_sub_signed(self.threshold) {
            Some(cutoff) => {
                info!("Checking for orders unfulfilled since {}", cutoff);
                match self.source.fetch_unfulfilled_orders(cutoff).await {
                    Ok(orders) => (cutoff, orders),
                    Err(e) => {
                        recover(&mut failures, CycleStage::Fetch, &e, "treating as zero orders");
                        (cutoff, Vec::new())
                    }
                }
            }
            None => {
                let e = WatchError::InvalidConfig(format!(
                    "threshold of {} days is out of range",
                    self.threshold.num_days()
                ));
                recover(&mut failures, CycleStage::Fetch, &e, "treating as zero orders");
                (DateTime::<Utc>::MIN_UTC, Vec::new())
            }
        };

        // SELECT
        let (starting_ledger, ledger_loaded) = self.load_ledger(&mut failures).await;
        let Selection { selected, ledger } = select(&fetched, &starting_ledger);

        // NOTIFY
        let messages_delivered = match self.notifier.notify(&selected).await {
            Ok(n) => n,
            Err(e) => {
                recover(
                    &mut failures,
                    CycleStage::Notify,
                    &e,
                    "orders stay recorded as alerted",
                );
                0
            }
        };

        // PERSIST
        let ledger_persisted = self
            .persist_ledger(&ledger, ledger_loaded, !selected.is_empty(), &mut failures)
            .await;

        let report = CycleReport {
            cycle_id,
            started_at: now,
            finished_at: Utc::now(),
            cutoff,
            fetched: fetched.len(),
            selected: selected.iter().map(|o| o.id.clone()).collect(),
            messages_delivered,
            ledger_size: ledger.len(),
            ledger_persisted,
            stage: CycleStage::Done,
            failures,
        };

        info!(
            "Check complete: fetched={} selected={} delivered={} ledger={} persisted={} failures={}",
            report.fetched,
            report.selected.len(),
            report.messages_delivered,
            report.ledger_size,
            report.ledger_persisted,
            report.failures.len()
        );
        report
    }

    /// Returns the ledger to select against and whether it was read
    /// successfully. A read failure falls back to an empty ledger.
    async fn load_ledger(&self, failures: &mut Vec<StageFailure>) -> (AlertLedger, bool) {
        let Some(store) = &self.ledger else {
            return (AlertLedger::new(), false);
        };
        match store.load().await {
            Ok(ledger) => (ledger, true),
            Err(e) => {
                recover(failures, CycleStage::Select, &e, "continuing with an empty ledger");
                (AlertLedger::new(), false)
            }
        }
    }

    async fn persist_ledger(
        &self,
        ledger: &AlertLedger,
        loaded: bool,
        has_new: bool,
        failures: &mut Vec<StageFailure>,
    ) -> bool {
        let Some(store) = &self.ledger else {
            return false;
        };
        if !self.persist {
            info!("Dry run: not saving {} alerted orders", ledger.len());
            return false;
        }
        // An unreadable ledger is only overwritten when there is something
        // new to record; an empty write would erase the stored history.
        if !loaded && !has_new {
            warn!("Ledger was not loaded and nothing new was alerted, leaving it untouched");
            return false;
        }
        match store.save(ledger).await {
            Ok(()) => true,
            Err(e) => {
                recover(
                    failures,
                    CycleStage::Persist,
                    &e,
                    "this cycle's alerts may repeat next cycle",
                );
                false
            }
        }
    }
}

fn recover(failures: &mut Vec<StageFailure>, stage: CycleStage, err: &WatchError, fallback: &str) {
    let kind: ErrorKind = err.kind();
    error!("{} failed ({}): {}; {}", stage, kind, err, fallback);
    failures.push(StageFailure {
        stage,
        kind: kind.as_str(),
        message: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationMode;
    use crate::domain::Order;
    use crate::persistence::MemoryBlobStore;
    use crate::services::notifier::LogChannel;
    use crate::traits::{MockNotificationChannel, MockOrderSource};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn order(id: &str, status: Option<&str>) -> Order {
        Order::new(
            id,
            chrono::DateTime::parse_from_rfc3339("2024-03-01T09:00:00+00:00").unwrap(),
            status,
        )
    }

    fn source_returning(orders: Vec<Order>) -> MockOrderSource {
        let mut source = MockOrderSource::new();
        source
            .expect_fetch_unfulfilled_orders()
            .returning(move |_| Ok(orders.clone()));
        source
    }

    fn runner(
        source: MockOrderSource,
        blobs: &MemoryBlobStore,
        channel: Arc<dyn crate::traits::NotificationChannel>,
    ) -> CycleRunner {
        CycleRunner::new(
            Arc::new(source),
            Some(LedgerStore::new(Arc::new(blobs.clone()), "alerts.json")),
            Notifier::new(channel, NotificationMode::Batch, 5),
            chrono::Duration::days(5),
        )
    }

    fn stored_ids(blobs: &MemoryBlobStore) -> Vec<String> {
        let raw = blobs.object("alerts.json").unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_cutoff_is_now_minus_threshold() {
        let mut source = MockOrderSource::new();
        source
            .expect_fetch_unfulfilled_orders()
            .withf(|cutoff| *cutoff == Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap())
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let blobs = MemoryBlobStore::new();
        let report = runner(source, &blobs, Arc::new(LogChannel)).run_at(now()).await;
        assert_eq!(report.stage, CycleStage::Done);
    }

    #[tokio::test]
    async fn test_new_breach_is_notified_and_recorded() {
        let blobs = MemoryBlobStore::new();
        let source = source_returning(vec![order("1001", None), order("1002", Some("fulfilled"))]);

        let report = runner(source, &blobs, Arc::new(LogChannel)).run_at(now()).await;

        assert_eq!(report.selected, vec![OrderId::from("1001")]);
        assert_eq!(report.messages_delivered, 1);
        assert!(report.ledger_persisted);
        assert_eq!(stored_ids(&blobs), vec!["1001"]);
        assert_eq!(report.status(), CheckStatus::complete());
    }

    #[tokio::test]
    async fn test_second_cycle_sends_nothing() {
        let blobs = MemoryBlobStore::new();
        let orders = vec![order("2001", None), order("2002", None)];

        let first = runner(source_returning(orders.clone()), &blobs, Arc::new(LogChannel))
            .run_at(now())
            .await;
        assert_eq!(first.selected.len(), 2);

        let mut channel = MockNotificationChannel::new();
        channel.expect_deliver().times(0);
        let second = runner(source_returning(orders), &blobs, Arc::new(channel))
            .run_at(now())
            .await;

        assert!(second.selected.is_empty());
        assert_eq!(second.messages_delivered, 0);
        assert_eq!(stored_ids(&blobs), vec!["2001", "2002"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_ledger_and_completes() {
        let blobs = MemoryBlobStore::new().with_object("alerts.json", br#"["1001"]"#);
        let mut source = MockOrderSource::new();
        source
            .expect_fetch_unfulfilled_orders()
            .returning(|_| Err(WatchError::UpstreamUnavailable("HTTP 503".to_string())));
        let mut channel = MockNotificationChannel::new();
        channel.expect_deliver().times(0);

        let report = runner(source, &blobs, Arc::new(channel)).run_at(now()).await;

        assert_eq!(report.stage, CycleStage::Done);
        assert!(report.selected.is_empty());
        assert!(report.failed_in(CycleStage::Fetch).is_some());
        assert!(report.ledger_persisted);
        assert_eq!(blobs.upload_count(), 1);
        assert_eq!(stored_ids(&blobs), vec!["1001"]);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_roll_back_ledger() {
        let blobs = MemoryBlobStore::new();
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_deliver()
            .times(1)
            .returning(|_| Err(WatchError::NotificationDelivery("HTTP 401".to_string())));

        let report = runner(source_returning(vec![order("3001", None)]), &blobs, Arc::new(channel))
            .run_at(now())
            .await;

        assert_eq!(
            report.failed_in(CycleStage::Notify).unwrap().kind,
            "notification_delivery_failure"
        );
        assert_eq!(report.messages_delivered, 0);
        assert_eq!(stored_ids(&blobs), vec!["3001"]);
    }

    #[tokio::test]
    async fn test_ledger_read_failure_fails_open() {
        let blobs = MemoryBlobStore::new().with_object("alerts.json", br#"["4001"]"#);
        blobs.set_fail_reads(true);

        let source = source_returning(vec![order("4001", None)]);
        let report = runner(source, &blobs, Arc::new(LogChannel))
            .run_at(now())
            .await;

        // History unavailable, so the order is alerted again
        assert_eq!(report.selected, vec![OrderId::from("4001")]);
        assert!(report.failed_in(CycleStage::Select).is_some());
        assert!(report.ledger_persisted);
    }

    #[tokio::test]
    async fn test_unreadable_ledger_not_erased_when_nothing_new() {
        let blobs = MemoryBlobStore::new().with_object("alerts.json", br#"["5001","5002"]"#);
        blobs.set_fail_reads(true);

        let report = runner(source_returning(Vec::new()), &blobs, Arc::new(LogChannel))
            .run_at(now())
            .await;

        assert!(!report.ledger_persisted);
        assert_eq!(blobs.upload_count(), 0);
        assert_eq!(blobs.object("alerts.json").unwrap(), br#"["5001","5002"]"#.to_vec());
    }

    #[tokio::test]
    async fn test_write_failure_is_recovered() {
        let blobs = MemoryBlobStore::new();
        blobs.set_fail_writes(true);

        let source = source_returning(vec![order("6001", None)]);
        let report = runner(source, &blobs, Arc::new(LogChannel))
            .run_at(now())
            .await;

        assert_eq!(report.stage, CycleStage::Done);
        assert!(!report.ledger_persisted);
        assert!(report.failed_in(CycleStage::Persist).is_some());
        assert_eq!(report.messages_delivered, 1);
    }

    #[tokio::test]
    async fn test_without_persist_leaves_storage_alone() {
        let blobs = MemoryBlobStore::new();
        let source = source_returning(vec![order("7001", None)]);
        let report = runner(source, &blobs, Arc::new(LogChannel))
            .without_persist()
            .run_at(now())
            .await;

        assert_eq!(report.selected.len(), 1);
        assert!(!report.ledger_persisted);
        assert_eq!(blobs.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_stateless_runner_renotifies_every_cycle() {
        let orders = vec![order("8001", None)];
        let make = || {
            CycleRunner::new(
                Arc::new(source_returning(orders.clone())),
                None,
                Notifier::new(Arc::new(LogChannel), NotificationMode::PerOrder, 10),
                chrono::Duration::days(10),
            )
        };

        let first = make().run_at(now()).await;
        let second = make().run_at(now()).await;

        assert_eq!(first.selected, second.selected);
        assert_eq!(second.messages_delivered, 1);
        assert!(!second.ledger_persisted);
    }

    #[tokio::test]
    async fn test_unrepresentable_cutoff_is_recovered() {
        let mut source = MockOrderSource::new();
        source.expect_fetch_unfulfilled_orders().times(0);
        let mut channel = MockNotificationChannel::new();
        channel.expect_deliver().times(0);

        let blobs = MemoryBlobStore::new().with_object("alerts.json", br#"["9001"]"#);
        let runner = CycleRunner::new(
            Arc::new(source),
            Some(LedgerStore::new(Arc::new(blobs.clone()), "alerts.json")),
            Notifier::new(Arc::new(channel), NotificationMode::Batch, 5),
            chrono::Duration::days(1_000_000_000),
        );
        let report = runner.run_at(now()).await;

        assert_eq!(report.stage, CycleStage::Done);
        assert_eq!(report.failed_in(CycleStage::Fetch).unwrap().kind, "configuration");
        assert_eq!(report.fetched, 0);
        assert_eq!(stored_ids(&blobs), vec!["9001"]);
    }

    #[test]
    fn test_status_payload_shape() {
        let json = serde_json::to_string(&CheckStatus::complete()).unwrap();
        assert_eq!(json, r#"{"status":"Check complete"}"#);
    }
}
