//! Migration to create the usage_records table.
//!
//! Rows start out granular and are later rewritten into per-language summaries
//! flagged with `is_consolidated`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageRecords::SessionId).uuid().not_null())
                    .col(
                        ColumnDef::new(UsageRecords::OrganisationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UsageRecords::Language).text().null())
                    .col(
                        ColumnDef::new(UsageRecords::CharacterCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::ClientCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UsageRecords::Date).date().not_null())
                    .col(
                        ColumnDef::new(UsageRecords::IsConsolidated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_usage_records_session_id")
                            .from(UsageRecords::Table, UsageRecords::SessionId)
                            .to(UsageSessions::Table, UsageSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_records_session_consolidated")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::SessionId)
                    .col(UsageRecords::IsConsolidated)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_usage_records_session_consolidated")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(UsageRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UsageRecords {
    Table,
    Id,
    SessionId,
    OrganisationId,
    Language,
    CharacterCount,
    ClientCount,
    Date,
    IsConsolidated,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UsageSessions {
    Table,
    Id,
}
