pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod funding;
pub mod http;
pub mod models;
pub mod report_gen;
pub mod reports;
pub mod telemetry;
