pub mod app;
pub mod app_state;
pub mod assignments;
pub mod auth;
pub mod certificates;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod middleware;
pub mod modules;
pub mod profile;
pub mod storage;
pub mod tasks;
pub mod telemetry;
