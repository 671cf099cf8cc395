pub mod account_objects;
pub mod accounts_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
