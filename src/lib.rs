pub mod auth;
pub mod billing;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod filter;
pub mod handlers;
pub mod jobs;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod testing;
pub mod types;
