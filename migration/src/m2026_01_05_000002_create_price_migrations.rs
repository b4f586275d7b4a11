//! Migration to create the price_migrations table.
//!
//! One row per bulk subscription price change campaign, carrying the display
//! pricing, the tier x currency price map and the campaign counters.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PriceMigrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceMigrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PriceMigrations::Name).text().not_null())
                    .col(
                        ColumnDef::new(PriceMigrations::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::OldPricing)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::NewPricing)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::NewPriceIds)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::OrganisationIds)
                            .json_binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::TotalCustomers)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::EmailsSentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::MigrationsCompleted)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::MigrationsFailed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::EmailsSentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::MigrationScheduledFor)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::MigrationCompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(PriceMigrations::CreatedBy).text().not_null())
                    .col(
                        ColumnDef::new(PriceMigrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PriceMigrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Scheduler poll: status = emails_sent AND migration_scheduled_for <= now
        manager
            .create_index(
                Index::create()
                    .name("idx_price_migrations_status_scheduled")
                    .table(PriceMigrations::Table)
                    .col(PriceMigrations::Status)
                    .col(PriceMigrations::MigrationScheduledFor)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_price_migrations_status_scheduled")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(PriceMigrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PriceMigrations {
    Table,
    Id,
    Name,
    Status,
    OldPricing,
    NewPricing,
    NewPriceIds,
    OrganisationIds,
    TotalCustomers,
    EmailsSentCount,
    MigrationsCompleted,
    MigrationsFailed,
    EmailsSentAt,
    MigrationScheduledFor,
    MigrationCompletedAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
