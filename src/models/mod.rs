//! # Data Models
//!
//! SeaORM entities for the billing ledger.

pub mod job_lease;
pub mod organisation;
pub mod price_migration;
pub mod price_migration_customer;
pub mod usage_record;
pub mod usage_session;

pub use job_lease::Entity as JobLease;
pub use organisation::Entity as Organisation;
pub use price_migration::{Entity as PriceMigration, MigrationStatus};
pub use price_migration_customer::{
    CustomerMigrationStatus, EmailStatus, Entity as PriceMigrationCustomer,
};
pub use usage_record::Entity as UsageRecord;
pub use usage_session::{Entity as UsageSession, SessionStatus};
