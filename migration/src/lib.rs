//! Database migrations for the billing core.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_05_000001_create_organisations;
mod m2026_01_05_000002_create_price_migrations;
mod m2026_01_05_000003_create_price_migration_customers;
mod m2026_01_05_000004_create_usage_sessions;
mod m2026_01_05_000005_create_usage_records;
mod m2026_01_05_000006_create_job_leases;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_05_000001_create_organisations::Migration),
            Box::new(m2026_01_05_000002_create_price_migrations::Migration),
            Box::new(m2026_01_05_000003_create_price_migration_customers::Migration),
            Box::new(m2026_01_05_000004_create_usage_sessions::Migration),
            Box::new(m2026_01_05_000005_create_usage_records::Migration),
            Box::new(m2026_01_05_000006_create_job_leases::Migration),
        ]
    }
}
