use std::{path::Path, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use loyalty_engine::{
    accrual::{AccrualClient, AccrualEngine, IntakeQueue, PushPolicy},
    events::{EventHandlers, EventHooks},
    AccountApi,
    LedgerDatabase,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    routes::{health, MyBalanceRoute, MyOrdersRoute, MyWithdrawalsRoute, SubmitOrderRoute, WithdrawRoute},
};

const EVENT_BUFFER_SIZE: usize = 128;

/// Runs the ledger until the HTTP server stops.
///
/// The accrual engine starts before the server binds and is shut down after the server has stopped, so no submission
/// can reach a closed intake queue.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    create_database_dir(&config.database_url)?;
    let mut db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let oracle = AccrualClient::new(&config.accrual_address, config.oracle_timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let engine = AccrualEngine::start(db.clone(), oracle, config.engine.clone(), handlers.producers());
    handlers.start_handlers();

    let result = match create_server_instance(&config, db.clone(), engine.intake().clone(), engine.submit_policy()) {
        Ok(srv) => {
            info!("💻️ Listening on {}", config.run_address);
            srv.await.map_err(ServerError::from)
        },
        Err(e) => Err(e),
    };
    engine.shutdown().await;
    if let Err(e) = db.close().await {
        warn!("🗃️ Could not close the database cleanly. {e}");
    }
    result
}

pub fn create_server_instance(
    config: &ServerConfig,
    db: SqliteDatabase,
    intake: IntakeQueue,
    submit_policy: PushPolicy,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(config);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), intake.clone(), submit_policy);
        let accounts_api = AccountApi::new(db.clone());
        let api_scope = web::scope("/api")
            .service(SubmitOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(MyBalanceRoute::<SqliteDatabase>::new())
            .service(WithdrawRoute::<SqliteDatabase>::new())
            .service(MyWithdrawalsRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("loyalty::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(options.clone()))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(config.run_address.as_str())?
    .run();
    Ok(srv)
}

fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_credited(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} credited {} points to user {}", ev.order.order_id, ev.amount, ev.order.user_id);
            })
        })
        .on_order_rejected(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} of user {} was rejected", ev.order.order_id, ev.order.user_id);
            })
        });
    hooks
}

/// SQLite creates the database file on demand, but not the directory it lives in.
fn create_database_dir(url: &str) -> Result<(), ServerError> {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🗃️ Creating database directory {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        },
        _ => Ok(()),
    }
}
