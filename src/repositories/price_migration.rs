//! # Price Migration Repository
//!
//! Persistence for migrations and their enrolled customers. Status changes
//! are conditional updates, so a row only moves forward from the state the
//! caller expects.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::models::price_migration::{
    self, Entity as PriceMigration, MigrationStatus, Model as MigrationModel,
};
use crate::models::price_migration_customer::{
    self, CustomerMigrationStatus, EmailStatus, Entity as PriceMigrationCustomer,
    Model as CustomerModel,
};

/// Snapshot of one organisation taken when it is enrolled in a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerSnapshot {
    pub organisation_id: Uuid,
    pub tier: String,
    pub currency: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_item_id: Option<String>,
    pub current_price_id: Option<String>,
    pub new_price_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PriceMigrationRepository {
    db: Arc<DatabaseConnection>,
}

impl PriceMigrationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn insert(
        &self,
        migration: price_migration::ActiveModel,
    ) -> Result<MigrationModel, DbErr> {
        migration.insert(self.db.as_ref()).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MigrationModel>, DbErr> {
        PriceMigration::find_by_id(id).one(self.db.as_ref()).await
    }

    /// All migrations, newest first.
    pub async fn list(&self) -> Result<Vec<MigrationModel>, DbErr> {
        PriceMigration::find()
            .order_by_desc(price_migration::Column::CreatedAt)
            .order_by_desc(price_migration::Column::Id)
            .all(self.db.as_ref())
            .await
    }

    /// Migrations whose notices went out and whose scheduled date has passed.
    pub async fn find_due(&self, now: DateTimeWithTimeZone) -> Result<Vec<MigrationModel>, DbErr> {
        PriceMigration::find()
            .filter(price_migration::Column::Status.eq(MigrationStatus::EmailsSent))
            .filter(price_migration::Column::MigrationScheduledFor.lte(now))
            .order_by_asc(price_migration::Column::MigrationScheduledFor)
            .all(self.db.as_ref())
            .await
    }

    /// Apply `changes` only if the migration is currently in one of `from`.
    /// Returns `true` when the row was updated.
    pub async fn transition(
        &self,
        id: Uuid,
        from: &[MigrationStatus],
        mut changes: price_migration::ActiveModel,
    ) -> Result<bool, DbErr> {
        changes.updated_at = Set(Utc::now().fixed_offset());

        let result = PriceMigration::update_many()
            .set(changes)
            .filter(price_migration::Column::Id.eq(id))
            .filter(price_migration::Column::Status.is_in(from.iter().copied()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Insert the customer row unless one already exists for this
    /// (migration, organisation) pair, then return the stored row.
    pub async fn enroll_customer(
        &self,
        migration_id: Uuid,
        snapshot: CustomerSnapshot,
    ) -> Result<CustomerModel, DbErr> {
        let now = Utc::now().fixed_offset();
        let organisation_id = snapshot.organisation_id;

        let row = price_migration_customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            migration_id: Set(migration_id),
            organisation_id: Set(organisation_id),
            tier: Set(snapshot.tier),
            currency: Set(snapshot.currency),
            stripe_customer_id: Set(snapshot.stripe_customer_id),
            stripe_subscription_id: Set(snapshot.stripe_subscription_id),
            stripe_subscription_item_id: Set(snapshot.stripe_subscription_item_id),
            current_price_id: Set(snapshot.current_price_id),
            new_price_id: Set(snapshot.new_price_id),
            email: Set(snapshot.email),
            email_status: Set(EmailStatus::Unsent),
            email_sent_at: Set(None),
            email_error: Set(None),
            migration_status: Set(CustomerMigrationStatus::Pending),
            migrated_at: Set(None),
            migration_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = PriceMigrationCustomer::insert(row)
            .on_conflict(
                OnConflict::columns([
                    price_migration_customer::Column::MigrationId,
                    price_migration_customer::Column::OrganisationId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await;

        match inserted {
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(err) => return Err(err),
        }

        PriceMigrationCustomer::find()
            .filter(price_migration_customer::Column::MigrationId.eq(migration_id))
            .filter(price_migration_customer::Column::OrganisationId.eq(organisation_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!(
                    "price_migration_customers({migration_id}, {organisation_id})"
                ))
            })
    }

    pub async fn customers(&self, migration_id: Uuid) -> Result<Vec<CustomerModel>, DbErr> {
        PriceMigrationCustomer::find()
            .filter(price_migration_customer::Column::MigrationId.eq(migration_id))
            .order_by_asc(price_migration_customer::Column::CreatedAt)
            .order_by_asc(price_migration_customer::Column::Id)
            .all(self.db.as_ref())
            .await
    }

    pub async fn pending_customers(
        &self,
        migration_id: Uuid,
    ) -> Result<Vec<CustomerModel>, DbErr> {
        PriceMigrationCustomer::find()
            .filter(price_migration_customer::Column::MigrationId.eq(migration_id))
            .filter(
                price_migration_customer::Column::MigrationStatus
                    .eq(CustomerMigrationStatus::Pending),
            )
            .order_by_asc(price_migration_customer::Column::CreatedAt)
            .order_by_asc(price_migration_customer::Column::Id)
            .all(self.db.as_ref())
            .await
    }

    /// Record the notice outcome for a row that is still `unsent`.
    pub async fn mark_email(
        &self,
        customer_id: Uuid,
        status: EmailStatus,
        error: Option<String>,
    ) -> Result<bool, DbErr> {
        let now = Utc::now().fixed_offset();
        let changes = price_migration_customer::ActiveModel {
            email_status: Set(status),
            email_sent_at: Set((status == EmailStatus::Sent).then_some(now)),
            email_error: Set(error),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = PriceMigrationCustomer::update_many()
            .set(changes)
            .filter(price_migration_customer::Column::Id.eq(customer_id))
            .filter(price_migration_customer::Column::EmailStatus.eq(EmailStatus::Unsent))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Record the subscription update outcome for a row that is still
    /// `pending`. Terminal rows are never touched.
    pub async fn mark_migration(
        &self,
        customer_id: Uuid,
        status: CustomerMigrationStatus,
        subscription_item_id: Option<String>,
        error: Option<String>,
    ) -> Result<bool, DbErr> {
        let now = Utc::now().fixed_offset();
        let mut changes = price_migration_customer::ActiveModel {
            migration_status: Set(status),
            migrated_at: Set((status == CustomerMigrationStatus::Completed).then_some(now)),
            migration_error: Set(error),
            updated_at: Set(now),
            ..Default::default()
        };
        if let Some(item_id) = subscription_item_id {
            changes.stripe_subscription_item_id = Set(Some(item_id));
        }

        let result = PriceMigrationCustomer::update_many()
            .set(changes)
            .filter(price_migration_customer::Column::Id.eq(customer_id))
            .filter(
                price_migration_customer::Column::MigrationStatus
                    .eq(CustomerMigrationStatus::Pending),
            )
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    pub async fn count_by_email_status(
        &self,
        migration_id: Uuid,
        status: EmailStatus,
    ) -> Result<u64, DbErr> {
        PriceMigrationCustomer::find()
            .filter(price_migration_customer::Column::MigrationId.eq(migration_id))
            .filter(price_migration_customer::Column::EmailStatus.eq(status))
            .count(self.db.as_ref())
            .await
    }

    pub async fn count_by_migration_status(
        &self,
        migration_id: Uuid,
        status: CustomerMigrationStatus,
    ) -> Result<u64, DbErr> {
        PriceMigrationCustomer::find()
            .filter(price_migration_customer::Column::MigrationId.eq(migration_id))
            .filter(price_migration_customer::Column::MigrationStatus.eq(status))
            .count(self.db.as_ref())
            .await
    }
}
