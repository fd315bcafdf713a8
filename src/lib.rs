pub mod api;
pub mod client;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod queue;
pub mod scan;
pub mod services;
pub mod state;
pub mod store;
