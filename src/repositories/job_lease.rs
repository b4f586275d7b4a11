//! # Job Lease Repository
//!
//! Persisted single-flight guard for batch jobs. A lease is claimed either by
//! inserting the job's row or by taking over a row whose lease has expired.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::models::job_lease::{ActiveModel, Column, Entity as JobLease, Model};

#[derive(Debug, Clone)]
pub struct JobLeaseRepository {
    db: Arc<DatabaseConnection>,
}

impl JobLeaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Try to claim `job_name` for `holder`. Returns `true` when the lease is
    /// now held by `holder`.
    pub async fn try_acquire(
        &self,
        job_name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, DbErr> {
        let now = Utc::now().fixed_offset();
        let expires_at = now + ttl;

        let taken_over = JobLease::update_many()
            .col_expr(Column::Holder, Expr::value(holder))
            .col_expr(Column::AcquiredAt, Expr::value(now))
            .col_expr(Column::ExpiresAt, Expr::value(expires_at))
            .filter(Column::JobName.eq(job_name))
            .filter(Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await?;

        if taken_over.rows_affected == 1 {
            tracing::info!(job = job_name, holder, "Took over expired job lease");
            return Ok(true);
        }

        let lease = ActiveModel {
            job_name: Set(job_name.to_string()),
            holder: Set(holder.to_string()),
            acquired_at: Set(now),
            expires_at: Set(expires_at),
        };

        let inserted = match JobLease::insert(lease)
            .on_conflict(OnConflict::column(Column::JobName).do_nothing().to_owned())
            .exec_without_returning(self.db.as_ref())
            .await
        {
            Ok(rows) => rows,
            Err(DbErr::RecordNotInserted) => 0,
            Err(err) => return Err(err),
        };

        Ok(inserted == 1)
    }

    /// Push out the expiry of a lease still held by `holder`. Returns `false`
    /// when the lease is gone or belongs to someone else.
    pub async fn renew(&self, job_name: &str, holder: &str, ttl: Duration) -> Result<bool, DbErr> {
        let expires_at = Utc::now().fixed_offset() + ttl;
        let result = JobLease::update_many()
            .col_expr(Column::ExpiresAt, Expr::value(expires_at))
            .filter(Column::JobName.eq(job_name))
            .filter(Column::Holder.eq(holder))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Release a lease held by `holder`. A lease taken over by someone else is
    /// left untouched.
    pub async fn release(&self, job_name: &str, holder: &str) -> Result<bool, DbErr> {
        let result = JobLease::delete_many()
            .filter(Column::JobName.eq(job_name))
            .filter(Column::Holder.eq(holder))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn find(&self, job_name: &str) -> Result<Option<Model>, DbErr> {
        JobLease::find_by_id(job_name.to_string())
            .one(self.db.as_ref())
            .await
    }
}
