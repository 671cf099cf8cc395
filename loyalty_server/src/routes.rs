//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they extract the user id and the request body, call
//! the engine API and map the result onto a response. Anything longer belongs in the engine.
//!
//! All handlers are async. The ledger calls they make are non-blocking, so a worker thread keeps serving other
//! requests while a handler waits on the database or the intake queue.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use loyalty_engine::{
    account_objects::{WithdrawalRequest, WithdrawalResult},
    AccountApi,
    BalanceManagement,
    OrderFlowApi,
    OrderFlowError,
    OrderManagement,
};

use crate::{errors::ServerError, helpers::UserId};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(submit_order => Post "/user/orders" impl OrderManagement);
/// Accepts an order number as a plain-text body.
///
/// Responds with `202 Accepted` for a new order and `200 OK` if this user has submitted the number before. A number
/// that belongs to someone else gives `409 Conflict`, and one that fails the Luhn check gives `422`.
pub async fn submit_order<B: OrderManagement>(
    user: UserId,
    body: String,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let number = body.trim();
    if number.is_empty() {
        return Err(ServerError::EmptyRequestBody);
    }
    trace!("💻️ User {} is submitting order {number}", user.0);
    match api.submit_order(user.0, number).await {
        Ok(order) => {
            debug!("💻️ Order {} from user {} accepted for processing", order.order_id, user.0);
            Ok(HttpResponse::Accepted().finish())
        },
        Err(OrderFlowError::AlreadySubmitted(order_id)) => {
            debug!("💻️ User {} resubmitted order {order_id}", user.0);
            Ok(HttpResponse::Ok().finish())
        },
        Err(e) => {
            debug!("💻️ Order submission from user {} failed. {e}", user.0);
            Err(e.into())
        },
    }
}

route!(my_orders => Get "/user/orders" impl OrderManagement, BalanceManagement);
pub async fn my_orders<B>(user: UserId, api: web::Data<AccountApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + BalanceManagement {
    let orders = api.orders_for_user(user.0).await?;
    if orders.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Balance  ----------------------------------------------------
route!(my_balance => Get "/user/balance" impl OrderManagement, BalanceManagement);
pub async fn my_balance<B>(user: UserId, api: web::Data<AccountApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + BalanceManagement {
    let balance = api.balance_for_user(user.0).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(withdraw => Post "/user/balance/withdraw" impl OrderManagement, BalanceManagement);
/// Spends points against an order number. The body is `{"order": "<number>", "sum": <decimal>}`.
///
/// `402 Payment Required` means the balance does not cover the sum. Nothing is debited in that case.
pub async fn withdraw<B>(user: UserId, body: String, api: web::Data<AccountApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + BalanceManagement {
    if body.trim().is_empty() {
        return Err(ServerError::EmptyRequestBody);
    }
    let request = serde_json::from_str::<WithdrawalRequest>(&body).map_err(|e| {
        debug!("💻️ Could not deserialize withdrawal request from user {}. {e}", user.0);
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let withdrawal = api.withdraw(user.0, request).await?;
    Ok(HttpResponse::Ok().json(WithdrawalResult::from(withdrawal)))
}

route!(my_withdrawals => Get "/user/withdrawals" impl OrderManagement, BalanceManagement);
pub async fn my_withdrawals<B>(user: UserId, api: web::Data<AccountApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + BalanceManagement {
    let withdrawals = api.withdrawals_for_user(user.0).await?;
    if withdrawals.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(withdrawals))
}
