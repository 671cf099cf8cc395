use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use loyalty_engine::{
    accrual::{intake_queue, IntakeQueue, IntakeReceiver, PushPolicy},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AccountApi,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerOptions,
    routes::{health, MyBalanceRoute, MyOrdersRoute, MyWithdrawalsRoute, SubmitOrderRoute, WithdrawRoute},
};

/// A fresh ledger and intake queue, with no engine draining the queue.
pub struct TestLedger {
    pub db: SqliteDatabase,
    pub intake: IntakeQueue,
    _receiver: IntakeReceiver,
}

impl TestLedger {
    pub async fn new(queue_capacity: usize) -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let (intake, _receiver) = intake_queue(queue_capacity);
        Self { db, intake, _receiver }
    }

    /// Sends the request to an app with every route registered and returns the status and body.
    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let orders_api = OrderFlowApi::new(self.db.clone(), self.intake.clone(), PushPolicy::Reject);
        let accounts_api = AccountApi::new(self.db.clone());
        let api_scope = web::scope("/api")
            .service(SubmitOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(MyBalanceRoute::<SqliteDatabase>::new())
            .service(WithdrawRoute::<SqliteDatabase>::new())
            .service(MyWithdrawalsRoute::<SqliteDatabase>::new());
        let app = App::new()
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(ServerOptions::default()))
            .service(health)
            .service(api_scope);
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
        (status, body)
    }
}

pub fn post(user_id: i64, path: &str, body: &str) -> TestRequest {
    TestRequest::post().uri(path).insert_header(("X-User-Id", user_id.to_string())).set_payload(body.to_string())
}

pub fn get(user_id: i64, path: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header(("X-User-Id", user_id.to_string()))
}
