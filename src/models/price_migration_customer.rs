//! PriceMigrationCustomer entity model
//!
//! Enrollment of one organisation in one price migration. The snapshot
//! columns are captured when notices go out; email delivery and subscription
//! update outcomes are tracked separately.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "price_migration_customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub migration_id: Uuid,

    pub organisation_id: Uuid,

    pub tier: String,

    pub currency: String,

    pub stripe_customer_id: Option<String>,

    pub stripe_subscription_id: Option<String>,

    pub stripe_subscription_item_id: Option<String>,

    pub current_price_id: Option<String>,

    /// Target price resolved from the migration's price map
    pub new_price_id: Option<String>,

    pub email: Option<String>,

    pub email_status: EmailStatus,

    pub email_sent_at: Option<DateTimeWithTimeZone>,

    pub email_error: Option<String>,

    pub migration_status: CustomerMigrationStatus,

    pub migrated_at: Option<DateTimeWithTimeZone>,

    pub migration_error: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    #[sea_orm(string_value = "unsent")]
    #[default]
    Unsent,

    #[sea_orm(string_value = "sent")]
    Sent,

    #[sea_orm(string_value = "failed")]
    Failed,

    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Unsent => "unsent",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
            EmailStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of the subscription price update for one customer.
///
/// Only `Pending` rows are ever processed; the other variants are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum CustomerMigrationStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,

    #[sea_orm(string_value = "completed")]
    Completed,

    #[sea_orm(string_value = "failed")]
    Failed,

    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl CustomerMigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerMigrationStatus::Pending => "pending",
            CustomerMigrationStatus::Completed => "completed",
            CustomerMigrationStatus::Failed => "failed",
            CustomerMigrationStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CustomerMigrationStatus::Pending)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::price_migration::Entity",
        from = "Column::MigrationId",
        to = "super::price_migration::Column::Id"
    )]
    Migration,

    #[sea_orm(
        belongs_to = "super::organisation::Entity",
        from = "Column::OrganisationId",
        to = "super::organisation::Column::Id"
    )]
    Organisation,
}

impl Related<super::price_migration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Migration.def()
    }
}

impl Related<super::organisation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organisation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
