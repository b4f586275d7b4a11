//! # Repository Layer
//!
//! Repository structs wrapping SeaORM operations for the billing ledger.

pub mod job_lease;
pub mod organisation;
pub mod price_migration;
pub mod usage;

pub use job_lease::JobLeaseRepository;
pub use organisation::OrganisationRepository;
pub use price_migration::{CustomerSnapshot, PriceMigrationRepository};
pub use usage::UsageRepository;
