//! Migration to create the organisations table.
//!
//! Organisations are owned by the wider platform; the billing core reads their
//! tier, currency and subscription references when planning price migrations.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organisations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Organisations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Organisations::Name).text().not_null())
                    .col(
                        ColumnDef::new(Organisations::Tier)
                            .text()
                            .not_null()
                            .default("free"),
                    )
                    .col(
                        ColumnDef::new(Organisations::Currency)
                            .text()
                            .not_null()
                            .default("gbp"),
                    )
                    .col(
                        ColumnDef::new(Organisations::SubscriptionStatus)
                            .text()
                            .not_null()
                            .default("inactive"),
                    )
                    .col(
                        ColumnDef::new(Organisations::StripeCustomerId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Organisations::StripeSubscriptionId)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(Organisations::BillingEmail).text().null())
                    .col(ColumnDef::new(Organisations::OwnerEmail).text().null())
                    .col(
                        ColumnDef::new(Organisations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Organisations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_organisations_subscription_status_tier")
                    .table(Organisations::Table)
                    .col(Organisations::SubscriptionStatus)
                    .col(Organisations::Tier)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_organisations_subscription_status_tier")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Organisations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Organisations {
    Table,
    Id,
    Name,
    Tier,
    Currency,
    SubscriptionStatus,
    StripeCustomerId,
    StripeSubscriptionId,
    BillingEmail,
    OwnerEmail,
    CreatedAt,
    UpdatedAt,
}
