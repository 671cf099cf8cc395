use std::{str::FromStr, sync::Arc, time::Duration};

use loyalty_common::MinorUnits;
use loyalty_engine::{
    accrual::{AccrualEngine, AccrualEngineConfig},
    db_types::{AccrualUpdate, NewOrder, OrderId, OrderStatusType},
    events::EventProducers,
    test_utils::{
        oracle::{invalid, processed, ScriptedOracle},
        prepare_env::{prepare_test_env, random_db_path},
    },
    BalanceManagement,
    OrderManagement,
};

/// Orders that were stored but never reconciled before a restart are recovered by the first sweep.
#[tokio::test]
async fn unsettled_orders_are_recovered_on_start() {
    let db = prepare_test_env(&random_db_path()).await;
    let ids = ["18", "26", "34"].map(|s| OrderId::from_str(s).unwrap());
    for id in &ids {
        db.insert_order(NewOrder::new(id.clone(), 11)).await.unwrap();
    }
    let update = AccrualUpdate::new(OrderStatusType::Processing, MinorUnits::ZERO);
    db.update_order_status_and_accrual(&ids[1], update).await.unwrap();
    db.settle_processed_order(&ids[2], MinorUnits::from(100)).await.unwrap();

    let oracle = Arc::new(ScriptedOracle::new());
    oracle.script("18", vec![processed("18", "2")]);
    oracle.script("26", vec![invalid("26")]);
    let config = AccrualEngineConfig { flush_interval: Duration::from_millis(10), ..Default::default() };
    let engine = AccrualEngine::start(db.clone(), Arc::clone(&oracle), config, EventProducers::default());

    let mut settled = false;
    for _ in 0..200 {
        if db.fetch_unsettled_orders(None, 10).await.unwrap().is_empty() {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    engine.shutdown().await;
    assert!(settled);

    let orders = db.fetch_orders_for_user(11).await.unwrap();
    let statuses = orders.iter().map(|o| o.status).collect::<Vec<_>>();
    assert_eq!(statuses, vec![OrderStatusType::Processed, OrderStatusType::Invalid, OrderStatusType::Processed]);
    assert_eq!(db.fetch_balance(11).await.unwrap().current, MinorUnits::from(300));
    // Settled orders are never polled
    assert_eq!(oracle.calls("34"), 0);
}
