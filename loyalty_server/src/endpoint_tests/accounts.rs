use std::str::FromStr;

use actix_web::http::StatusCode;
use loyalty_common::MinorUnits;
use loyalty_engine::{db_types::OrderId, BalanceManagement, OrderManagement};
use serde_json::Value;

use super::helpers::{get, post, TestLedger};

#[actix_web::test]
async fn balance_of_a_new_user() {
    let ledger = TestLedger::new(4).await;
    let (status, body) = ledger.call(get(5, "/api/user/balance")).await;
    assert_eq!(status, StatusCode::OK);
    let balance: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(balance["current"].as_f64(), Some(0.0));
    assert_eq!(balance["withdrawn"].as_f64(), Some(0.0));
}

#[actix_web::test]
async fn withdraw_points() {
    let ledger = TestLedger::new(4).await;
    ledger.db.credit_balance(5, MinorUnits::from(10_000)).await.unwrap();
    let (status, body) = ledger.call(post(5, "/api/user/balance/withdraw", r#"{"order": "2377225624", "sum": 75.5}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let withdrawal: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(withdrawal["order"], "2377225624");
    assert_eq!(withdrawal["sum"].as_f64(), Some(75.5));

    let (_, body) = ledger.call(get(5, "/api/user/balance")).await;
    let balance: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(balance["current"].as_f64(), Some(24.5));
    assert_eq!(balance["withdrawn"].as_f64(), Some(75.5));

    let (status, body) = ledger.call(get(5, "/api/user/withdrawals")).await;
    assert_eq!(status, StatusCode::OK);
    let withdrawals: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(withdrawals.len(), 1);
    // A withdrawal does not register an order
    let order_id = OrderId::from_str("2377225624").unwrap();
    assert!(ledger.db.fetch_order_by_order_id(&order_id).await.unwrap().is_none());
}

#[actix_web::test]
async fn withdraw_more_than_the_balance() {
    let ledger = TestLedger::new(4).await;
    ledger.db.credit_balance(5, MinorUnits::from(1_000)).await.unwrap();
    let (status, body) = ledger.call(post(5, "/api/user/balance/withdraw", r#"{"order": "2377225624", "sum": 10.01}"#)).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body.contains("Insufficient funds"));
    assert_eq!(ledger.db.fetch_balance(5).await.unwrap().current, MinorUnits::from(1_000));
    let (status, _) = ledger.call(get(5, "/api/user/withdrawals")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn invalid_withdrawals() {
    let ledger = TestLedger::new(4).await;
    ledger.db.credit_balance(5, MinorUnits::from(1_000)).await.unwrap();
    let path = "/api/user/balance/withdraw";
    let (status, _) = ledger.call(post(5, path, r#"{"order": "2377225625", "sum": 1}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = ledger.call(post(5, path, r#"{"order": "2377225624", "sum": -1}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = ledger.call(post(5, path, r#"{"order": "2377225624"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = ledger.call(post(5, path, "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ledger.db.fetch_balance(5).await.unwrap().current, MinorUnits::from(1_000));
}
