//! Server configuration.
//!
//! Values come from command line flags and environment variables. Where both are given, the environment wins.
//! Engine tuning is read from `LOYALTY_*` variables only. A variable that cannot be parsed is reported and ignored.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use loyalty_common::helpers::parse_boolean_flag;
use loyalty_engine::{
    accrual::{AccrualEngineConfig, PushPolicy},
    db::sqlite::SQLITE_DB_URL,
};

use crate::cli::Arguments;

pub const DEFAULT_RUN_ADDRESS: &str = "localhost:8080";
pub const DEFAULT_ACCRUAL_ADDRESS: &str = "http://localhost:8081";
pub const DEFAULT_USER_HEADER: &str = "X-User-Id";
const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// host:port to bind the HTTP server to
    pub run_address: String,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Base URL of the accrual oracle
    pub accrual_address: String,
    /// Per-request timeout for oracle calls
    pub oracle_timeout: Duration,
    /// The header carrying the authenticated user id, set by the upstream authentication layer.
    pub user_header: String,
    pub engine: AccrualEngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            run_address: DEFAULT_RUN_ADDRESS.to_string(),
            database_url: SQLITE_DB_URL.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            accrual_address: DEFAULT_ACCRUAL_ADDRESS.to_string(),
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            user_header: DEFAULT_USER_HEADER.to_string(),
            engine: AccrualEngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_args_and_env(args: Arguments) -> Self {
        Self::from_sources(args, |name| env::var(name).ok())
    }

    /// Builds the configuration from parsed flags and a variable lookup.
    pub fn from_sources<F>(args: Arguments, var: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let run_address = var("RUN_ADDRESS").or(args.run_address).unwrap_or(defaults.run_address);
        let database_url = var("DATABASE_URI").or(args.database_uri).unwrap_or_else(|| {
            info!("🪛️ No database URI was given. Using {SQLITE_DB_URL}");
            defaults.database_url
        });
        let accrual_address = var("ACCRUAL_SYSTEM_ADDRESS").or(args.accrual_address).unwrap_or_else(|| {
            warn!("🪛️ No accrual system address was given. Using {DEFAULT_ACCRUAL_ADDRESS}");
            defaults.accrual_address
        });
        let user_header = var("LOYALTY_USER_HEADER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.user_header);
        let db_max_connections = parse_var(&var, "LOYALTY_DB_MAX_CONNECTIONS", defaults.db_max_connections);
        let oracle_timeout = parse_var(&var, "LOYALTY_ORACLE_TIMEOUT_MS", DEFAULT_ORACLE_TIMEOUT.as_millis() as u64);
        let oracle_timeout = Duration::from_millis(oracle_timeout);
        let engine = engine_config(&var, defaults.engine);
        Self { run_address, database_url, db_max_connections, accrual_address, oracle_timeout, user_header, engine }
    }
}

fn engine_config<F>(var: &F, defaults: AccrualEngineConfig) -> AccrualEngineConfig
where F: Fn(&str) -> Option<String> {
    let millis = |name: &str, default: Duration| Duration::from_millis(parse_var(var, name, default.as_millis() as u64));
    AccrualEngineConfig {
        queue_capacity: parse_var(var, "LOYALTY_QUEUE_CAPACITY", defaults.queue_capacity),
        batch_size: parse_var(var, "LOYALTY_BATCH_SIZE", defaults.batch_size),
        flush_interval: millis("LOYALTY_FLUSH_INTERVAL_MS", defaults.flush_interval),
        max_attempts: parse_var(var, "LOYALTY_MAX_ATTEMPTS", defaults.max_attempts),
        retry_backoff: millis("LOYALTY_RETRY_BACKOFF_MS", defaults.retry_backoff),
        max_concurrency: parse_var(var, "LOYALTY_MAX_CONCURRENCY", defaults.max_concurrency),
        submit_policy: submit_policy(var("LOYALTY_SUBMIT_TIMEOUT_MS")),
        requeue_on_exhausted: parse_boolean_flag(var("LOYALTY_REQUEUE_ON_EXHAUSTED"), defaults.requeue_on_exhausted),
        sweep_interval: Duration::from_secs(parse_var(
            var,
            "LOYALTY_SWEEP_INTERVAL_SECS",
            defaults.sweep_interval.as_secs(),
        )),
        ..defaults
    }
}

/// Unset rejects when the queue is full, `0` blocks, and any other value waits that many milliseconds.
fn submit_policy(value: Option<String>) -> PushPolicy {
    let Some(value) = value else {
        return PushPolicy::Reject;
    };
    match value.trim().parse::<u64>() {
        Ok(0) => PushPolicy::Block,
        Ok(ms) => PushPolicy::Timeout(Duration::from_millis(ms)),
        Err(e) => {
            warn!("🪛️ Invalid configuration value for LOYALTY_SUBMIT_TIMEOUT_MS ({value}). {e} Submissions will not wait.");
            PushPolicy::Reject
        },
    }
}

fn parse_var<F, T>(var: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match var(name) {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e} Using the default, {default}, instead.");
            default
        }),
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The part of the configuration that request handlers need.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub user_header: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { user_header: config.user_header.clone() }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { user_header: DEFAULT_USER_HEADER.to_string() }
    }
}
