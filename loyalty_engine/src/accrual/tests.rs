use std::{
    future::Future,
    pin::Pin,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use loyalty_common::MinorUnits;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::{
    accrual::{
        intake_queue,
        AccrualClientError,
        AccrualEngine,
        AccrualEngineConfig,
        IntakeQueue,
        IntakeReceiver,
        PushPolicy,
        QueueEntry,
        ReconcileOutcome,
        Reconciler,
        RecoverySweep,
    },
    db_types::{NewOrder, OrderId, OrderStatusType},
    events::{EventHandlers, EventHooks, EventProducers, OrderCreditedEvent, OrderRejectedEvent},
    helpers::is_valid_luhn,
    test_utils::{
        oracle::{invalid, not_registered, processed, processing, registered, transient, ScriptedOracle},
        prepare_env::{prepare_test_env, random_db_path},
    },
    BalanceManagement,
    OrderFlowError,
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};

struct Pipeline {
    db: SqliteDatabase,
    oracle: Arc<ScriptedOracle>,
    intake: IntakeQueue,
    receiver: IntakeReceiver,
    api: OrderFlowApi<SqliteDatabase>,
}

impl Pipeline {
    async fn new(capacity: usize) -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let (intake, receiver) = intake_queue(capacity);
        let api = OrderFlowApi::new(db.clone(), intake.clone(), PushPolicy::Reject);
        Self { db, oracle: Arc::new(ScriptedOracle::new()), intake, receiver, api }
    }

    fn reconciler(&self, config: &AccrualEngineConfig) -> Reconciler<SqliteDatabase, ScriptedOracle> {
        self.reconciler_with_producers(config, EventProducers::default())
    }

    fn reconciler_with_producers(
        &self,
        config: &AccrualEngineConfig,
        producers: EventProducers,
    ) -> Reconciler<SqliteDatabase, ScriptedOracle> {
        Reconciler::new(
            self.db.clone(),
            Arc::clone(&self.oracle),
            self.intake.clone(),
            producers,
            config,
            TaskTracker::new(),
        )
    }
}

fn oid(s: &str) -> OrderId {
    OrderId::from_str(s).unwrap()
}

/// Appends the Luhn check digit to `base`.
fn luhn_number(base: u64) -> String {
    (0..10).map(|d| format!("{base}{d}")).find(|s| is_valid_luhn(s)).unwrap()
}

async fn wait_for<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn processing_then_processed_credits_once() {
    let mut p = Pipeline::new(20).await;
    let order = "12345678903";
    p.oracle.script(order, vec![processing(order), processed(order, "5.00"), processed(order, "5.00")]);
    let reconciler = p.reconciler(&AccrualEngineConfig::default());

    let submitted = p.api.submit_order(1, order).await.unwrap();
    assert_eq!(submitted.status, OrderStatusType::New);
    let entry = p.receiver.recv().await.unwrap();
    assert_eq!(entry.status, OrderStatusType::New);

    let outcome = reconciler.reconcile(entry).await;
    assert_eq!(outcome, ReconcileOutcome::Requeued(OrderStatusType::Processing));
    let stored = p.db.fetch_order_by_order_id(&oid(order)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Processing);
    assert_eq!(p.db.fetch_balance(1).await.unwrap().current, MinorUnits::ZERO);
    assert!(p.intake.is_tracked(&oid(order)));

    let entry = p.receiver.recv().await.unwrap();
    assert_eq!(entry.status, OrderStatusType::Processing);
    let stale = entry.clone();
    let outcome = reconciler.reconcile(entry).await;
    assert_eq!(outcome, ReconcileOutcome::Credited(MinorUnits::from(500)));
    let stored = p.db.fetch_order_by_order_id(&oid(order)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Processed);
    assert_eq!(stored.accrual, MinorUnits::from(500));
    assert_eq!(p.db.fetch_balance(1).await.unwrap().current, MinorUnits::from(500));
    assert!(!p.intake.is_tracked(&oid(order)));
    assert!(p.intake.is_empty());

    // A second reconciliation of the same order must not credit again
    let outcome = reconciler.reconcile(stale).await;
    assert_eq!(outcome, ReconcileOutcome::AlreadyFinal(OrderStatusType::Processed));
    assert_eq!(p.db.fetch_balance(1).await.unwrap().current, MinorUnits::from(500));
    assert_eq!(p.oracle.calls(order), 3);
}

#[tokio::test]
async fn luhn_invalid_orders_never_enter_the_pipeline() {
    let p = Pipeline::new(20).await;
    let err = p.api.submit_order(1, "1234567890").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidOrderId(_)));
    assert!(p.intake.is_empty());
    assert_eq!(p.intake.tracked_count(), 0);
    assert!(p.db.fetch_orders_for_user(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn resubmissions_are_conflicts() {
    let p = Pipeline::new(20).await;
    p.api.submit_order(1, "79927398713").await.unwrap();
    let err = p.api.submit_order(1, " 79927398713 ").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::AlreadySubmitted(_)));
    let err = p.api.submit_order(2, "79927398713").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OwnedByAnotherUser(_)));
    assert_eq!(p.intake.len(), 1);
    let orders = p.db.fetch_orders_for_user(1).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert!(p.db.fetch_orders_for_user(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn submission_succeeds_when_the_queue_is_full() {
    let p = Pipeline::new(1).await;
    p.api.submit_order(1, "18").await.unwrap();
    let order = p.api.submit_order(1, "26").await.unwrap();
    assert_eq!(order.status, OrderStatusType::New);
    assert_eq!(p.intake.len(), 1);
    assert!(!p.intake.is_tracked(&oid("26")));
    let unsettled = p.db.fetch_unsettled_orders(None, 10).await.unwrap();
    assert_eq!(unsettled.len(), 2);
}

#[tokio::test]
async fn exhausted_attempts_leave_the_order_alone() {
    let mut p = Pipeline::new(20).await;
    let order = "12345678903";
    p.oracle.script(order, vec![transient(), transient(), transient()]);
    let reconciler = p.reconciler(&AccrualEngineConfig::default());
    p.api.submit_order(1, order).await.unwrap();
    let entry = p.receiver.recv().await.unwrap();

    let outcome = reconciler.reconcile(entry).await;
    assert_eq!(outcome, ReconcileOutcome::Exhausted { requeued: false });
    assert_eq!(p.oracle.calls(order), 3);
    let stored = p.db.fetch_order_by_order_id(&oid(order)).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::New);
    assert!(p.intake.is_empty());
    assert!(!p.intake.is_tracked(&oid(order)));
}

#[tokio::test]
async fn exhausted_attempts_can_requeue() {
    let mut p = Pipeline::new(20).await;
    let order = "18";
    p.oracle.script(order, vec![transient(), transient()]);
    let config = AccrualEngineConfig { max_attempts: 2, requeue_on_exhausted: true, ..Default::default() };
    let reconciler = p.reconciler(&config);
    p.api.submit_order(1, order).await.unwrap();
    let entry = p.receiver.recv().await.unwrap();

    let outcome = reconciler.reconcile(entry).await;
    assert_eq!(outcome, ReconcileOutcome::Exhausted { requeued: true });
    assert_eq!(p.oracle.calls(order), 2);
    assert_eq!(p.receiver.recv().await.unwrap().order_id, oid(order));
}

#[tokio::test]
async fn retries_stop_at_the_first_answer() {
    let mut p = Pipeline::new(20).await;
    let order = "18";
    p.oracle.script(order, vec![transient(), registered(order), processed(order, "1")]);
    let reconciler = p.reconciler(&AccrualEngineConfig::default());
    p.api.submit_order(1, order).await.unwrap();
    let entry = p.receiver.recv().await.unwrap();

    let outcome = reconciler.reconcile(entry).await;
    assert_eq!(outcome, ReconcileOutcome::Requeued(OrderStatusType::Registered));
    assert_eq!(p.oracle.calls(order), 2);
}

#[tokio::test]
async fn rate_limits_are_honoured() {
    let mut p = Pipeline::new(20).await;
    let order = "18";
    let limited = Err(AccrualClientError::RateLimited { retry_after: Duration::from_millis(100) });
    p.oracle.script(order, vec![limited, processed(order, "0.5")]);
    let reconciler = p.reconciler(&AccrualEngineConfig::default());
    p.api.submit_order(1, order).await.unwrap();
    let entry = p.receiver.recv().await.unwrap();

    let start = Instant::now();
    let outcome = reconciler.reconcile(entry).await;
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(outcome, ReconcileOutcome::Credited(MinorUnits::from(50)));
}

#[tokio::test]
async fn unknown_orders_and_statuses_are_polled_again() {
    let mut p = Pipeline::new(20).await;
    let order = "18";
    let odd = Ok(Some(crate::accrual::AccrualResponse::new(
        order,
        crate::accrual::AccrualStatus::Unrecognised("ON_HOLD".into()),
        None,
    )));
    p.oracle.script(order, vec![not_registered(), odd]);
    let reconciler = p.reconciler(&AccrualEngineConfig::default());
    p.api.submit_order(1, order).await.unwrap();

    for _ in 0..2 {
        let entry = p.receiver.recv().await.unwrap();
        let outcome = reconciler.reconcile(entry).await;
        assert_eq!(outcome, ReconcileOutcome::Requeued(OrderStatusType::New));
        let stored = p.db.fetch_order_by_order_id(&oid(order)).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatusType::New);
    }
    assert_eq!(p.intake.len(), 1);
}

#[tokio::test]
async fn events_are_published_for_final_outcomes() {
    let mut p = Pipeline::new(20).await;
    p.oracle.script("18", vec![processed("18", "12.345")]);
    p.oracle.script("26", vec![invalid("26")]);

    let (credited_tx, mut credited_rx) = mpsc::channel::<OrderCreditedEvent>(4);
    let (rejected_tx, mut rejected_rx) = mpsc::channel::<OrderRejectedEvent>(4);
    let mut hooks = EventHooks::default();
    hooks
        .on_order_credited(move |ev| {
            let tx = credited_tx.clone();
            Box::pin(async move {
                let _ = tx.send(ev).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
        .on_order_rejected(move |ev| {
            let tx = rejected_tx.clone();
            Box::pin(async move {
                let _ = tx.send(ev).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
    let handlers = EventHandlers::new(4, hooks);
    let reconciler = p.reconciler_with_producers(&AccrualEngineConfig::default(), handlers.producers());
    handlers.start_handlers();

    p.api.submit_order(3, "18").await.unwrap();
    p.api.submit_order(3, "26").await.unwrap();
    let first = p.receiver.recv().await.unwrap();
    let second = p.receiver.recv().await.unwrap();
    reconciler.dispatch(vec![first, second]);

    let credited = credited_rx.recv().await.unwrap();
    assert_eq!(credited.order.order_id, oid("18"));
    assert_eq!(credited.amount, MinorUnits::from(1_235));
    let rejected = rejected_rx.recv().await.unwrap();
    assert_eq!(rejected.order.order_id, oid("26"));
    assert_eq!(rejected.order.status, OrderStatusType::Invalid);
    assert_eq!(p.db.fetch_balance(3).await.unwrap().current, MinorUnits::from(1_235));
}

#[tokio::test]
async fn sweep_offers_unsettled_orders_without_blocking() {
    let p = Pipeline::new(2).await;
    for id in ["18", "26", "34"] {
        p.db.insert_order(NewOrder::new(oid(id), 1)).await.unwrap();
    }
    let sweep = RecoverySweep::new(p.db.clone(), p.intake.clone(), Duration::from_secs(60), 100);
    let report = sweep.sweep_once().await.unwrap();
    assert_eq!((report.found, report.queued, report.in_flight, report.deferred), (3, 2, 0, 1));

    // The next run carries on from the order that did not fit.
    let report = sweep.sweep_once().await.unwrap();
    assert_eq!((report.found, report.queued, report.in_flight, report.deferred), (1, 0, 0, 1));
    assert_eq!(p.intake.tracked_count(), 2);
    assert!(!p.intake.is_tracked(&oid("34")));
}

#[tokio::test]
async fn sweep_reaches_orders_behind_a_page_of_busy_ones() {
    let p = Pipeline::new(8).await;
    for id in ["18", "26", "34"] {
        p.db.insert_order(NewOrder::new(oid(id), 1)).await.unwrap();
    }
    for id in ["18", "26"] {
        let entry = QueueEntry::new(oid(id), 1, OrderStatusType::Processing);
        p.intake.push(entry, PushPolicy::Reject).await.unwrap();
    }
    let sweep = RecoverySweep::new(p.db.clone(), p.intake.clone(), Duration::from_secs(60), 2);
    let report = sweep.sweep_once().await.unwrap();
    assert_eq!((report.found, report.queued, report.in_flight, report.deferred), (2, 0, 2, 0));
    assert!(!p.intake.is_tracked(&oid("34")));

    let report = sweep.sweep_once().await.unwrap();
    assert_eq!((report.found, report.queued, report.in_flight, report.deferred), (1, 1, 0, 0));
    assert!(p.intake.is_tracked(&oid("34")));

    // A short page wraps around to the oldest order again.
    let report = sweep.sweep_once().await.unwrap();
    assert_eq!((report.found, report.queued, report.in_flight, report.deferred), (2, 0, 2, 0));
}

#[tokio::test]
async fn engine_reconciles_a_burst_of_orders() {
    let db = prepare_test_env(&random_db_path()).await;
    let oracle = Arc::new(ScriptedOracle::new().with_delay(Duration::from_millis(20)));
    let orders = (1..=30u64).map(|i| luhn_number(1_000 + i)).collect::<Vec<_>>();
    for (i, order) in orders.iter().enumerate() {
        if i % 3 == 0 {
            oracle.script(order, vec![registered(order), processing(order), processed(order, "1.50")]);
        } else {
            oracle.script(order, vec![processed(order, "1.50")]);
        }
    }
    let config = AccrualEngineConfig {
        queue_capacity: 8,
        batch_size: 5,
        flush_interval: Duration::from_millis(20),
        max_concurrency: 4,
        submit_policy: PushPolicy::Block,
        ..Default::default()
    };
    let engine = AccrualEngine::start(db.clone(), Arc::clone(&oracle), config, EventProducers::default());
    let api = engine.order_flow_api(db.clone());
    for order in &orders {
        api.submit_order(42, order).await.unwrap();
    }

    let credited = wait_for(Duration::from_secs(10), || {
        let db = db.clone();
        async move { db.fetch_balance(42).await.unwrap().current == MinorUnits::from(30 * 150) }
    })
    .await;
    assert!(credited, "All orders should have been credited");
    let intake = engine.intake().clone();
    engine.shutdown().await;

    assert!(oracle.max_in_flight() <= 4);
    for (i, order) in orders.iter().enumerate() {
        let expected = if i % 3 == 0 { 3 } else { 1 };
        assert!(oracle.calls(order) >= expected);
    }
    assert!(db.fetch_unsettled_orders(None, 100).await.unwrap().is_empty());
    assert_eq!(intake.tracked_count(), 0);
}

#[tokio::test]
async fn shutdown_releases_pending_orders() {
    let db = prepare_test_env(&random_db_path()).await;
    let oracle = ScriptedOracle::new();
    let config = AccrualEngineConfig {
        flush_interval: Duration::from_secs(3_600),
        submit_policy: PushPolicy::Block,
        ..Default::default()
    };
    let engine = AccrualEngine::start(db.clone(), oracle, config, EventProducers::default());
    // Let the scheduler consume the first tick of its flush timer
    tokio::time::sleep(Duration::from_millis(50)).await;
    let api = engine.order_flow_api(db.clone());
    for order in ["18", "26", "34"] {
        api.submit_order(1, order).await.unwrap();
    }
    let intake = engine.intake().clone();
    assert_eq!(intake.tracked_count(), 3);
    engine.shutdown().await;

    assert_eq!(intake.tracked_count(), 0);
    let unsettled = db.fetch_unsettled_orders(None, 10).await.unwrap();
    assert_eq!(unsettled.len(), 3);
    assert!(unsettled.iter().all(|o| o.status == OrderStatusType::New));
}
