//! # Usage Repository
//!
//! Queries over usage sessions and records used by the consolidation job.

use std::sync::Arc;

use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Func, Query};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use crate::models::usage_record::{self, Entity as UsageRecord};
use crate::models::usage_session::{self, Entity as UsageSession, SessionStatus};

#[derive(Debug, Clone)]
pub struct UsageRepository {
    db: Arc<DatabaseConnection>,
}

impl UsageRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finished sessions started before `cutoff` that still hold more than
    /// `min_rows` unconsolidated records, oldest first.
    pub async fn find_consolidation_candidates(
        &self,
        cutoff: DateTimeWithTimeZone,
        min_rows: u64,
        limit: u64,
    ) -> Result<Vec<usage_session::Model>, DbErr> {
        let crowded_sessions = Query::select()
            .column(usage_record::Column::SessionId)
            .from(UsageRecord)
            .and_where(usage_record::Column::IsConsolidated.eq(false))
            .group_by_col(usage_record::Column::SessionId)
            .and_having(
                Expr::expr(Func::count(Expr::col(usage_record::Column::Id)))
                    .gt(min_rows as i64),
            )
            .to_owned();

        UsageSession::find()
            .filter(
                usage_session::Column::Status
                    .is_in([SessionStatus::Completed, SessionStatus::Recovered]),
            )
            .filter(usage_session::Column::StartedAt.lt(cutoff))
            .filter(usage_session::Column::Id.in_subquery(crowded_sessions))
            .order_by_asc(usage_session::Column::StartedAt)
            .order_by_asc(usage_session::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
    }

    pub async fn unconsolidated_records(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<usage_record::Model>, DbErr> {
        UsageRecord::find()
            .filter(usage_record::Column::SessionId.eq(session_id))
            .filter(usage_record::Column::IsConsolidated.eq(false))
            .order_by_asc(usage_record::Column::CreatedAt)
            .order_by_asc(usage_record::Column::Id)
            .all(self.db.as_ref())
            .await
    }

    pub async fn records_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<usage_record::Model>, DbErr> {
        UsageRecord::find()
            .filter(usage_record::Column::SessionId.eq(session_id))
            .order_by_asc(usage_record::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
    }

    /// Atomically delete `originals` and insert `replacements`. Fails and
    /// rolls back if any original was already gone or consolidated.
    pub async fn replace_records(
        &self,
        originals: &[Uuid],
        replacements: Vec<usage_record::ActiveModel>,
    ) -> Result<(u64, u64), DbErr> {
        let txn = self.db.begin().await?;

        let removed = UsageRecord::delete_many()
            .filter(usage_record::Column::Id.is_in(originals.iter().copied()))
            .filter(usage_record::Column::IsConsolidated.eq(false))
            .exec(&txn)
            .await?
            .rows_affected;

        if removed != originals.len() as u64 {
            txn.rollback().await?;
            return Err(DbErr::Custom(format!(
                "expected to remove {} usage records, found {}",
                originals.len(),
                removed
            )));
        }

        let created = replacements.len() as u64;
        if !replacements.is_empty() {
            UsageRecord::insert_many(replacements)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok((removed, created))
    }
}
