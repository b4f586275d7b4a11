//! Migration to create the price_migration_customers table.
//!
//! Each row tracks one organisation's participation in one price migration.
//! Email delivery and subscription update outcomes are tracked independently.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PriceMigrationCustomers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::MigrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::OrganisationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PriceMigrationCustomers::Tier).text().not_null())
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::Currency)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::StripeCustomerId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::StripeSubscriptionId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::StripeSubscriptionItemId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::CurrentPriceId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::NewPriceId)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(PriceMigrationCustomers::Email).text().null())
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::EmailStatus)
                            .text()
                            .not_null()
                            .default("unsent"),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::EmailSentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::EmailError)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::MigrationStatus)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::MigratedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::MigrationError)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PriceMigrationCustomers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_price_migration_customers_migration_id")
                            .from(
                                PriceMigrationCustomers::Table,
                                PriceMigrationCustomers::MigrationId,
                            )
                            .to(PriceMigrations::Table, PriceMigrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_price_migration_customers_organisation_id")
                            .from(
                                PriceMigrationCustomers::Table,
                                PriceMigrationCustomers::OrganisationId,
                            )
                            .to(Organisations::Table, Organisations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // An organisation is enrolled at most once per migration
        manager
            .create_index(
                Index::create()
                    .name("idx_price_migration_customers_migration_org")
                    .table(PriceMigrationCustomers::Table)
                    .col(PriceMigrationCustomers::MigrationId)
                    .col(PriceMigrationCustomers::OrganisationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_price_migration_customers_migration_status")
                    .table(PriceMigrationCustomers::Table)
                    .col(PriceMigrationCustomers::MigrationId)
                    .col(PriceMigrationCustomers::MigrationStatus)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_price_migration_customers_migration_status")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_price_migration_customers_migration_org")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .table(PriceMigrationCustomers::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum PriceMigrationCustomers {
    Table,
    Id,
    MigrationId,
    OrganisationId,
    Tier,
    Currency,
    StripeCustomerId,
    StripeSubscriptionId,
    StripeSubscriptionItemId,
    CurrentPriceId,
    NewPriceId,
    Email,
    EmailStatus,
    EmailSentAt,
    EmailError,
    MigrationStatus,
    MigratedAt,
    MigrationError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PriceMigrations {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Organisations {
    Table,
    Id,
}
