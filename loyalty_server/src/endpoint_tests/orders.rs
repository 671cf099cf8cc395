use actix_web::{http::StatusCode, test::TestRequest};
use loyalty_engine::OrderManagement;
use serde_json::Value;

use super::helpers::{get, post, TestLedger};

#[actix_web::test]
async fn health_check() {
    let ledger = TestLedger::new(4).await;
    let (status, body) = ledger.call(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn submit_order_without_user_id() {
    let ledger = TestLedger::new(4).await;
    let req = TestRequest::post().uri("/api/user/orders").set_payload("12345678903");
    let (status, body) = ledger.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"No user id was supplied with the request"}"#);
}

#[actix_web::test]
async fn submit_new_order() {
    let ledger = TestLedger::new(4).await;
    let (status, body) = ledger.call(post(1, "/api/user/orders", "12345678903\n")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
    assert_eq!(ledger.intake.len(), 1);
    let (status, body) = ledger.call(get(1, "/api/user/orders")).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(orders[0]["number"], "12345678903");
    assert_eq!(orders[0]["status"], "NEW");
    assert!(orders[0].get("accrual").is_none());
}

#[actix_web::test]
async fn resubmitting_orders() {
    let ledger = TestLedger::new(4).await;
    let (status, _) = ledger.call(post(1, "/api/user/orders", "12345678903")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = ledger.call(post(1, "/api/user/orders", "12345678903")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = ledger.call(post(2, "/api/user/orders", "12345678903")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("another user"));
    assert_eq!(ledger.intake.len(), 1);
}

#[actix_web::test]
async fn submit_bad_order_numbers() {
    let ledger = TestLedger::new(4).await;
    let (status, _) = ledger.call(post(1, "/api/user/orders", "12345678900")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = ledger.call(post(1, "/api/user/orders", "not-a-number")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = ledger.call(post(1, "/api/user/orders", "  ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(ledger.db.fetch_orders_for_user(1).await.unwrap().is_empty());
}

#[actix_web::test]
async fn submission_succeeds_when_the_queue_is_full() {
    let ledger = TestLedger::new(1).await;
    let (status, _) = ledger.call(post(1, "/api/user/orders", "18")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = ledger.call(post(1, "/api/user/orders", "26")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(ledger.db.fetch_unsettled_orders(None, 10).await.unwrap().len(), 2);
    assert_eq!(ledger.intake.len(), 1);
}

#[actix_web::test]
async fn fetch_my_orders() {
    let ledger = TestLedger::new(4).await;
    let (status, _) = ledger.call(get(1, "/api/user/orders")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    ledger.call(post(1, "/api/user/orders", "18")).await;
    ledger.call(post(1, "/api/user/orders", "26")).await;
    ledger.call(post(2, "/api/user/orders", "34")).await;
    let (status, body) = ledger.call(get(1, "/api/user/orders")).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Value> = serde_json::from_str(&body).unwrap();
    let numbers = orders.iter().map(|o| o["number"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(numbers, vec!["18", "26"]);
}
