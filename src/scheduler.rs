//! # Billing Scheduler
//!
//! Background loop that periodically executes due price migrations and
//! consolidates old usage. Each job runs under a persisted lease so that only
//! one process executes it at a time, even with several instances deployed.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Duration as TokioDuration, Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::BillingError;
use crate::price_migration::{ExecutionReport, PriceMigrationService};
use crate::repositories::JobLeaseRepository;
use crate::telemetry;
use crate::usage_consolidation::{ConsolidationReport, UsageConsolidator};

pub const MIGRATION_JOB: &str = "price_migration_executor";
pub const CONSOLIDATION_JOB: &str = "usage_consolidation";

/// Result of a leased job invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobRun<T> {
    Ran { report: T },
    /// Another holder owns the lease; nothing was done
    Skipped,
}

impl<T> JobRun<T> {
    pub fn report(self) -> Option<T> {
        match self {
            JobRun::Ran { report } => Some(report),
            JobRun::Skipped => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationRunFailure {
    pub migration_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationPollReport {
    pub executed: Vec<ExecutionReport>,
    pub errors: Vec<MigrationRunFailure>,
}

pub struct BillingScheduler {
    config: Arc<AppConfig>,
    migrations: Arc<PriceMigrationService>,
    consolidator: Arc<UsageConsolidator>,
    leases: JobLeaseRepository,
    holder: String,
}

impl BillingScheduler {
    pub fn new(
        config: Arc<AppConfig>,
        migrations: Arc<PriceMigrationService>,
        consolidator: Arc<UsageConsolidator>,
        leases: JobLeaseRepository,
    ) -> Self {
        Self {
            config,
            migrations,
            consolidator,
            leases,
            holder: format!("billing-ops-{}-{}", std::process::id(), Uuid::new_v4()),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Run both jobs on their intervals until `shutdown` fires. The first
    /// tick of each job happens immediately.
    #[instrument(skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), BillingError> {
        info!(holder = %self.holder, "Starting billing scheduler");

        let mut migration_ticker = interval(TokioDuration::from_secs(
            self.config.scheduler.migration_interval_seconds,
        ));
        migration_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consolidation_ticker = interval(TokioDuration::from_secs(
            self.config.scheduler.consolidation_interval_seconds,
        ));
        consolidation_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Billing scheduler shutdown requested");
                    break;
                }
                _ = migration_ticker.tick() => {
                    let started = Instant::now();
                    if let Err(err) = self.run_due_migrations().await {
                        error!(error = %err, job = MIGRATION_JOB, "Scheduled job failed");
                    }
                    histogram!("billing_scheduler_tick_duration_ms", "job" => MIGRATION_JOB)
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                }
                _ = consolidation_ticker.tick() => {
                    let started = Instant::now();
                    if let Err(err) = self.run_consolidation().await {
                        error!(error = %err, job = CONSOLIDATION_JOB, "Scheduled job failed");
                    }
                    histogram!("billing_scheduler_tick_duration_ms", "job" => CONSOLIDATION_JOB)
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Billing scheduler stopped");
        Ok(())
    }

    /// Execute every migration whose notice period has elapsed.
    pub async fn run_due_migrations(&self) -> Result<JobRun<MigrationPollReport>, BillingError> {
        self.with_lease(MIGRATION_JOB, async {
            let due = self.migrations.pending_migrations().await?;
            info!(due = due.len(), "Polled for due price migrations");

            let mut report = MigrationPollReport::default();
            for migration in due {
                match self.migrations.execute(migration.id).await {
                    Ok(execution) => report.executed.push(execution),
                    Err(err) => {
                        error!(migration_id = %migration.id, error = %err, "Scheduled migration execution failed");
                        report.errors.push(MigrationRunFailure {
                            migration_id: migration.id,
                            error: err.to_string(),
                        });
                    }
                }
            }
            Ok(report)
        })
        .await
    }

    pub async fn run_consolidation(&self) -> Result<JobRun<ConsolidationReport>, BillingError> {
        self.with_lease(CONSOLIDATION_JOB, self.consolidator.consolidate_old_sessions())
            .await
    }

    async fn with_lease<T, F>(&self, job: &'static str, work: F) -> Result<JobRun<T>, BillingError>
    where
        F: Future<Output = Result<T, BillingError>>,
    {
        let ttl = Duration::seconds(self.config.scheduler.lease_ttl_seconds as i64);
        if !self.leases.try_acquire(job, &self.holder, ttl).await? {
            debug!(job, "Job lease held elsewhere; skipping run");
            counter!("billing_scheduler_runs_total", "job" => job, "outcome" => "skipped")
                .increment(1);
            return Ok(JobRun::Skipped);
        }

        let heartbeat = self.spawn_lease_renewal(job, ttl);
        let result = work.instrument(telemetry::job_span(job)).await;
        heartbeat.abort();

        match self.leases.release(job, &self.holder).await {
            Ok(true) => {}
            Ok(false) => warn!(job, "Job lease was taken over before release"),
            Err(err) => warn!(job, error = %err, "Failed to release job lease"),
        }

        let outcome = if result.is_ok() { "ran" } else { "failed" };
        counter!("billing_scheduler_runs_total", "job" => job, "outcome" => outcome).increment(1);

        result.map(|report| JobRun::Ran { report })
    }

    /// Renew the lease every third of its TTL for as long as the job runs.
    fn spawn_lease_renewal(&self, job: &'static str, ttl: Duration) -> JoinHandle<()> {
        let leases = self.leases.clone();
        let holder = self.holder.clone();
        let every = TokioDuration::from_secs((self.config.scheduler.lease_ttl_seconds / 3).max(1));

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match leases.renew(job, &holder, ttl).await {
                    Ok(true) => debug!(job, "Renewed job lease"),
                    Ok(false) => {
                        warn!(job, "Job lease lost while the job was running");
                        break;
                    }
                    Err(err) => warn!(job, error = %err, "Failed to renew job lease"),
                }
            }
        })
    }
}
