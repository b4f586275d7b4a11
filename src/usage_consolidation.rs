//! Usage consolidation job.
//!
//! Rewrites the fine-grained usage rows of old, finished sessions into one
//! row per language. Per-session character totals are preserved exactly and
//! each session is replaced inside a single transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use metrics::{counter, histogram};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, Set};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ConsolidationConfig;
use crate::error::BillingError;
use crate::models::usage_record;
use crate::repositories::UsageRepository;

/// Language key used for rows that were recorded without a language.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Aggregate of one language's rows within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageTotals {
    pub language: String,
    pub character_count: i64,
    pub client_count: i32,
    pub date: NaiveDate,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionFailure {
    pub session_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub sessions_consolidated: u64,
    pub sessions_skipped: u64,
    pub records_removed: u64,
    pub records_created: u64,
    pub errors: Vec<SessionFailure>,
}

impl ConsolidationReport {
    pub fn net_reduction(&self) -> i64 {
        self.records_removed as i64 - self.records_created as i64
    }
}

/// Group rows by language: characters are summed, the peak client count is
/// kept, and the date and creation time come from the earliest row.
pub fn group_by_language(records: &[usage_record::Model]) -> Vec<LanguageTotals> {
    let mut groups: BTreeMap<String, LanguageTotals> = BTreeMap::new();

    for record in records {
        let language = record
            .language
            .clone()
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());

        groups
            .entry(language.clone())
            .and_modify(|totals| {
                totals.character_count += record.character_count;
                totals.client_count = totals.client_count.max(record.client_count);
                if record.created_at < totals.created_at {
                    totals.created_at = record.created_at;
                    totals.date = record.date;
                }
            })
            .or_insert_with(|| LanguageTotals {
                language,
                character_count: record.character_count,
                client_count: record.client_count,
                date: record.date,
                created_at: record.created_at,
            });
    }

    groups.into_values().collect()
}

enum SessionOutcome {
    Consolidated { removed: u64, created: u64 },
    Skipped,
}

pub struct UsageConsolidator {
    config: ConsolidationConfig,
    usage: UsageRepository,
}

impl UsageConsolidator {
    pub fn new(db: Arc<DatabaseConnection>, config: ConsolidationConfig) -> Self {
        Self {
            config,
            usage: UsageRepository::new(db),
        }
    }

    /// Consolidate up to one batch of eligible sessions. A failing session is
    /// rolled back and reported; the rest of the batch still runs.
    pub async fn consolidate_old_sessions(&self) -> Result<ConsolidationReport, BillingError> {
        let started = std::time::Instant::now();
        let cutoff = (Utc::now() - Duration::days(i64::from(self.config.retention_days)))
            .fixed_offset();

        let sessions = self
            .usage
            .find_consolidation_candidates(cutoff, self.config.min_rows, self.config.batch_size)
            .await?;

        tracing::info!(
            candidates = sessions.len(),
            cutoff = %cutoff,
            "Starting usage consolidation"
        );

        let mut report = ConsolidationReport::default();

        for session in sessions {
            let span = tracing::info_span!("consolidate_session", session_id = %session.id);
            match self.consolidate_session(session.id).instrument(span).await {
                Ok(SessionOutcome::Consolidated { removed, created }) => {
                    report.sessions_consolidated += 1;
                    report.records_removed += removed;
                    report.records_created += created;
                }
                Ok(SessionOutcome::Skipped) => report.sessions_skipped += 1,
                Err(err) => {
                    tracing::error!(session_id = %session.id, error = %err, "Session consolidation failed");
                    counter!("usage_consolidation_session_failures_total").increment(1);
                    report.errors.push(SessionFailure {
                        session_id: session.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        counter!("usage_consolidation_records_removed_total").increment(report.records_removed);
        counter!("usage_consolidation_records_created_total").increment(report.records_created);
        histogram!("usage_consolidation_duration_ms").record(started.elapsed().as_millis() as f64);

        tracing::info!(
            sessions_consolidated = report.sessions_consolidated,
            sessions_skipped = report.sessions_skipped,
            records_removed = report.records_removed,
            records_created = report.records_created,
            failures = report.errors.len(),
            "Usage consolidation finished"
        );

        Ok(report)
    }

    async fn consolidate_session(&self, session_id: Uuid) -> Result<SessionOutcome, BillingError> {
        let records = self.usage.unconsolidated_records(session_id).await?;
        if records.len() as u64 <= self.config.min_rows {
            tracing::debug!(rows = records.len(), "Too few rows to consolidate");
            return Ok(SessionOutcome::Skipped);
        }

        let Some(first) = records.first() else {
            return Ok(SessionOutcome::Skipped);
        };
        let organisation_id = first.organisation_id;

        let replacements = group_by_language(&records)
            .into_iter()
            .map(|totals| usage_record::ActiveModel {
                id: Set(Uuid::new_v4()),
                session_id: Set(session_id),
                organisation_id: Set(organisation_id),
                language: Set(Some(totals.language)),
                character_count: Set(totals.character_count),
                client_count: Set(totals.client_count),
                date: Set(totals.date),
                is_consolidated: Set(true),
                created_at: Set(totals.created_at),
            })
            .collect::<Vec<_>>();

        let originals: Vec<Uuid> = records.iter().map(|record| record.id).collect();
        let (removed, created) = self.usage.replace_records(&originals, replacements).await?;

        tracing::debug!(removed, created, "Session consolidated");
        Ok(SessionOutcome::Consolidated { removed, created })
    }
}
