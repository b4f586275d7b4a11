//! Migration to create the usage_sessions table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageSessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UsageSessions::OrganisationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageSessions::Status)
                            .text()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(UsageSessions::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageSessions::EndedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_usage_sessions_organisation_id")
                            .from(UsageSessions::Table, UsageSessions::OrganisationId)
                            .to(Organisations::Table, Organisations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_sessions_status_started")
                    .table(UsageSessions::Table)
                    .col(UsageSessions::Status)
                    .col(UsageSessions::StartedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_usage_sessions_status_started")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(UsageSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UsageSessions {
    Table,
    Id,
    OrganisationId,
    Status,
    StartedAt,
    EndedAt,
}

#[derive(DeriveIden)]
enum Organisations {
    Table,
    Id,
}
