//! # Loyalty ledger server
//! This crate hosts the loyalty ledger. It is responsible for:
//! Loading the configuration and bootstrapping the ledger database.
//! Running the accrual engine for as long as the HTTP server is up.
//! Exposing the ledger to users over a small REST API.
//!
//! ## Configuration
//! The server is configured via command line flags and environment variables. See [config](config/index.html) for
//! more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /api/user/orders`: Submit an order number for accrual.
//! * `GET /api/user/orders`: The user's orders and their accrual status.
//! * `GET /api/user/balance`: The user's current and withdrawn points.
//! * `POST /api/user/balance/withdraw`: Spend points against an order number.
//! * `GET /api/user/withdrawals`: The user's withdrawals.
//!
//! Authentication is handled upstream. Every `/api` request carries the user id in a header (`X-User-Id` by default).

pub mod cli;
pub mod config;
pub mod errors;

pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
