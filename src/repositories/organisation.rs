//! # Organisation Repository
//!
//! Read-only queries over organisations for billing selection.

use std::sync::Arc;

use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Select,
};
use uuid::Uuid;

use crate::models::organisation::{ACTIVE_SUBSCRIPTION, Column, Entity as Organisation, Model};
use crate::pricing::Tier;

#[derive(Debug, Clone)]
pub struct OrganisationRepository {
    db: Arc<DatabaseConnection>,
}

impl OrganisationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Organisations with an active subscription in a migratable tier and a
    /// known subscription reference, optionally restricted to an allowlist.
    fn eligible(allowlist: Option<&[Uuid]>) -> Select<Organisation> {
        let mut condition = Condition::all()
            .add(Column::SubscriptionStatus.eq(ACTIVE_SUBSCRIPTION))
            .add(Column::Tier.is_in(Tier::ALL.iter().map(Tier::as_str)))
            .add(Column::StripeSubscriptionId.is_not_null());

        if let Some(ids) = allowlist {
            condition = condition.add(Column::Id.is_in(ids.iter().copied()));
        }

        Organisation::find().filter(condition)
    }

    pub async fn find_eligible(&self, allowlist: Option<&[Uuid]>) -> Result<Vec<Model>, DbErr> {
        Self::eligible(allowlist)
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(self.db.as_ref())
            .await
    }
}
