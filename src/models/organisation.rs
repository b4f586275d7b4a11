//! Organisation entity model
//!
//! Customer organisations as seen by the billing core. The core only reads
//! these rows; they are maintained by the account management side.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Subscription status value that makes an organisation eligible for billing work.
pub const ACTIVE_SUBSCRIPTION: &str = "active";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "organisations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    /// Subscription tier as stored (e.g. free, basic, standard, pro)
    pub tier: String,

    /// Lowercase ISO currency code
    pub currency: String,

    pub subscription_status: String,

    pub stripe_customer_id: Option<String>,

    pub stripe_subscription_id: Option<String>,

    pub billing_email: Option<String>,

    pub owner_email: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Address notices go to: the billing contact, falling back to the owner.
    pub fn contact_email(&self) -> Option<&str> {
        self.billing_email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .or_else(|| {
                self.owner_email
                    .as_deref()
                    .filter(|email| !email.trim().is_empty())
            })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::price_migration_customer::Entity")]
    PriceMigrationCustomers,

    #[sea_orm(has_many = "super::usage_session::Entity")]
    UsageSessions,
}

impl Related<super::price_migration_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceMigrationCustomers.def()
    }
}

impl Related<super::usage_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsageSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
