//! np-autodeploy: scheduled naughty price deployment.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod cli;
pub mod config;
pub mod engine;
pub mod invoker;
pub mod notify;
pub mod pricing;
pub mod scheduler;
pub mod storage;
pub mod types;
