//! PriceMigration entity model
//!
//! One row per bulk subscription price change campaign. Display pricing and
//! the target price map are stored as JSON documents.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "price_migrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    pub status: MigrationStatus,

    /// Serialized `PriceSheet` customers are moving away from
    #[sea_orm(column_type = "JsonBinary")]
    pub old_pricing: JsonValue,

    /// Serialized `PriceSheet` customers are moving to
    #[sea_orm(column_type = "JsonBinary")]
    pub new_pricing: JsonValue,

    /// Serialized `PriceMap` of target provider prices
    #[sea_orm(column_type = "JsonBinary")]
    pub new_price_ids: JsonValue,

    /// Optional allowlist of organisation ids; absent means every eligible organisation
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub organisation_ids: Option<JsonValue>,

    pub total_customers: i32,

    pub emails_sent_count: i32,

    pub migrations_completed: i32,

    pub migrations_failed: i32,

    pub emails_sent_at: Option<DateTimeWithTimeZone>,

    /// Set together with `emails_sent_at`, one notice period later
    pub migration_scheduled_for: Option<DateTimeWithTimeZone>,

    pub migration_completed_at: Option<DateTimeWithTimeZone>,

    pub created_by: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,

    #[sea_orm(string_value = "emails_sent")]
    EmailsSent,

    #[sea_orm(string_value = "completed")]
    Completed,

    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::EmailsSent => "emails_sent",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Completed | MigrationStatus::Cancelled)
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::price_migration_customer::Entity")]
    Customers,
}

impl Related<super::price_migration_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
