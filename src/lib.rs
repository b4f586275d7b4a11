//! # Billing Operations Library
//!
//! Billing core of the admin tooling: the subscription price migration
//! engine, the usage consolidation job, their scheduler, and the admin
//! facade used by the dashboard and the operator CLI.

pub mod api;
pub mod billing_provider;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod price_migration;
pub mod pricing;
pub mod repositories;
pub mod scheduler;
pub mod telemetry;
pub mod usage_consolidation;
pub use migration;
