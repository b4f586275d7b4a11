//! # Price Migration Engine
//!
//! Drives a bulk subscription price change through its lifecycle:
//!
//! ```text
//! pending     --send emails--> emails_sent --execute--> completed
//! pending     --cancel-------> cancelled
//! emails_sent --cancel-------> cancelled
//! ```
//!
//! Customers are enrolled when notices go out. Each customer row tracks its
//! own email and subscription update outcome, so one failure never blocks the
//! rest of the batch and re-running a step only touches unprocessed rows.

pub mod notice;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::billing_provider::{ProviderError, SubscriptionProvider};
use crate::config::PriceMigrationConfig;
use crate::error::{BillingError, MAX_STORED_ERROR_CHARS, truncate_message};
use crate::mail::{DeliveryReport, EmailMessage, Notifier};
use crate::models::organisation;
use crate::models::price_migration::{self, MigrationStatus, Model as MigrationModel};
use crate::models::price_migration_customer::{
    CustomerMigrationStatus, EmailStatus, Model as CustomerModel,
};
use crate::pricing::{Currency, PriceMap, PriceSheet, Tier};
use crate::repositories::{CustomerSnapshot, OrganisationRepository, PriceMigrationRepository};

use notice::{NoticeContext, render_notice};

/// Days between the notice email and the scheduled price change.
pub const NOTICE_PERIOD_DAYS: i64 = 7;

pub const NO_EMAIL_ADDRESS: &str = "No email address";
pub const NO_SUBSCRIPTION_ID: &str = "No subscription ID";

/// Input of [`PriceMigrationService::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMigrationRequest {
    pub name: String,
    pub old_pricing: PriceSheet,
    pub new_pricing: PriceSheet,
    pub new_price_ids: PriceMap,
    /// Restrict the migration to these organisations.
    #[serde(default)]
    pub organisation_ids: Option<Vec<Uuid>>,
}

/// An organisation selected for a migration, enriched with provider data.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationCandidate {
    pub organisation_id: Uuid,
    pub organisation_name: String,
    pub tier: String,
    pub currency: String,
    pub email: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_item_id: Option<String>,
    pub current_price_id: Option<String>,
    pub new_price_id: Option<String>,
}

impl From<&MigrationCandidate> for CustomerSnapshot {
    fn from(candidate: &MigrationCandidate) -> Self {
        CustomerSnapshot {
            organisation_id: candidate.organisation_id,
            tier: candidate.tier.clone(),
            currency: candidate.currency.clone(),
            stripe_customer_id: candidate.stripe_customer_id.clone(),
            stripe_subscription_id: candidate.stripe_subscription_id.clone(),
            stripe_subscription_item_id: candidate.stripe_subscription_item_id.clone(),
            current_price_id: candidate.current_price_id.clone(),
            new_price_id: candidate.new_price_id.clone(),
            email: candidate.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerFailure {
    pub organisation_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendEmailsReport {
    pub migration_id: Uuid,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Rows handled by an earlier run and left untouched
    pub already_processed: u64,
    pub scheduled_for: DateTime<Utc>,
    pub errors: Vec<CustomerFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub migration_id: Uuid,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errors: Vec<CustomerFailure>,
}

/// Row counts per email and migration status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub total: u64,
    pub email: BTreeMap<&'static str, u64>,
    pub migration: BTreeMap<&'static str, u64>,
}

impl CustomerSummary {
    pub fn from_customers(customers: &[CustomerModel]) -> Self {
        let mut summary = CustomerSummary {
            total: customers.len() as u64,
            ..Default::default()
        };
        for customer in customers {
            *summary
                .email
                .entry(customer.email_status.as_str())
                .or_default() += 1;
            *summary
                .migration
                .entry(customer.migration_status.as_str())
                .or_default() += 1;
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationDetails {
    pub migration: MigrationModel,
    pub customers: Vec<CustomerModel>,
    pub summary: CustomerSummary,
}

/// Decoded JSON documents of a stored migration.
struct MigrationPlan {
    old_pricing: PriceSheet,
    new_pricing: PriceSheet,
    price_map: PriceMap,
    allowlist: Option<Vec<Uuid>>,
}

impl TryFrom<&MigrationModel> for MigrationPlan {
    type Error = BillingError;

    fn try_from(migration: &MigrationModel) -> Result<Self, Self::Error> {
        Ok(MigrationPlan {
            old_pricing: serde_json::from_value(migration.old_pricing.clone())?,
            new_pricing: serde_json::from_value(migration.new_pricing.clone())?,
            price_map: serde_json::from_value(migration.new_price_ids.clone())?,
            allowlist: migration
                .organisation_ids
                .clone()
                .map(serde_json::from_value)
                .transpose()?,
        })
    }
}

pub struct PriceMigrationService {
    config: PriceMigrationConfig,
    migrations: PriceMigrationRepository,
    organisations: OrganisationRepository,
    provider: Arc<dyn SubscriptionProvider>,
    notifier: Arc<dyn Notifier>,
}

impl PriceMigrationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: PriceMigrationConfig,
        provider: Arc<dyn SubscriptionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            migrations: PriceMigrationRepository::new(db.clone()),
            organisations: OrganisationRepository::new(db),
            provider,
            notifier,
        }
    }

    /// Validate and store a new migration in `pending` state.
    pub async fn create(
        &self,
        request: CreateMigrationRequest,
        created_by: &str,
    ) -> Result<MigrationModel, BillingError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(BillingError::validation("Migration name is required"));
        }

        let created_by = created_by.trim();
        if created_by.is_empty() {
            return Err(BillingError::validation("Migration creator is required"));
        }

        if request.new_price_ids.is_empty() {
            return Err(BillingError::validation("New price IDs are required"));
        }

        let blank: Vec<String> = request
            .new_price_ids
            .entries()
            .filter(|(_, _, price_id)| price_id.trim().is_empty())
            .map(|(tier, currency, _)| format!("{tier}/{currency}"))
            .collect();
        if !blank.is_empty() {
            return Err(BillingError::validation(format!(
                "Empty price ID for: {}",
                blank.join(", ")
            )));
        }

        let allowlist = match request.organisation_ids {
            Some(ids) if ids.is_empty() => {
                return Err(BillingError::validation(
                    "Organisation allowlist must not be empty when provided",
                ));
            }
            Some(ids) => Some(
                ids.into_iter()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect::<Vec<_>>(),
            ),
            None => None,
        };

        let eligible = self
            .organisations
            .find_eligible(allowlist.as_deref())
            .await?;

        // Uncovered customers are skipped at execution, not rejected here.
        let uncovered: BTreeSet<String> = eligible
            .iter()
            .filter(|org| {
                request
                    .new_price_ids
                    .resolve(&org.tier, &org.currency)
                    .is_none()
            })
            .map(|org| format!("{}/{}", org.tier, org.currency.to_lowercase()))
            .collect();
        if !uncovered.is_empty() {
            tracing::warn!(
                name,
                uncovered = %uncovered.iter().cloned().collect::<Vec<_>>().join(", "),
                "Some eligible organisations have no new price ID and will be skipped"
            );
        }

        let now = Utc::now().fixed_offset();
        let migration = price_migration::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            status: Set(MigrationStatus::Pending),
            old_pricing: Set(serde_json::to_value(&request.old_pricing)?),
            new_pricing: Set(serde_json::to_value(&request.new_pricing)?),
            new_price_ids: Set(serde_json::to_value(&request.new_price_ids)?),
            organisation_ids: Set(allowlist.as_ref().map(serde_json::to_value).transpose()?),
            total_customers: Set(eligible.len() as i32),
            emails_sent_count: Set(0),
            migrations_completed: Set(0),
            migrations_failed: Set(0),
            emails_sent_at: Set(None),
            migration_scheduled_for: Set(None),
            migration_completed_at: Set(None),
            created_by: Set(created_by.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let migration = self.migrations.insert(migration).await?;

        tracing::info!(
            migration_id = %migration.id,
            name = %migration.name,
            total_customers = migration.total_customers,
            created_by,
            "Price migration created"
        );

        Ok(migration)
    }

    /// Enroll every candidate and send each one a price change notice.
    pub async fn send_emails(&self, migration_id: Uuid) -> Result<SendEmailsReport, BillingError> {
        let migration = self.load(migration_id).await?;
        if migration.status != MigrationStatus::Pending {
            return Err(BillingError::invalid_state(format!(
                "Cannot send emails for migration in status '{}'",
                migration.status
            )));
        }

        let plan = MigrationPlan::try_from(&migration)?;
        let candidates = self.resolve_candidates(&plan).await?;
        let effective_date = Utc::now() + Duration::days(NOTICE_PERIOD_DAYS);

        tracing::info!(
            migration_id = %migration_id,
            candidates = candidates.len(),
            "Sending price migration emails"
        );

        let mut report = SendEmailsReport {
            migration_id,
            sent: 0,
            failed: 0,
            skipped: 0,
            already_processed: 0,
            scheduled_for: effective_date,
            errors: Vec::new(),
        };
        let mut delivered_any = false;

        for candidate in &candidates {
            let row = self
                .migrations
                .enroll_customer(migration_id, candidate.into())
                .await?;

            if row.email_status != EmailStatus::Unsent {
                report.already_processed += 1;
                continue;
            }

            let Some(email) = row.email.clone() else {
                self.migrations
                    .mark_email(row.id, EmailStatus::Skipped, Some(NO_EMAIL_ADDRESS.to_string()))
                    .await?;
                counter!("price_migration_emails_total", "outcome" => "skipped").increment(1);
                tracing::info!(
                    migration_id = %migration_id,
                    organisation_id = %row.organisation_id,
                    "No email address; notice skipped"
                );
                report.skipped += 1;
                continue;
            };

            if delivered_any && !self.config.email_delay().is_zero() {
                tokio::time::sleep(self.config.email_delay()).await;
            }
            delivered_any = true;

            let delivery = match self.notice_for(candidate, &row, &plan, email, effective_date) {
                Some(message) => self.notifier.send_email(&message).await,
                None => DeliveryReport::failed(format!(
                    "Unsupported tier/currency {}/{}",
                    row.tier, row.currency
                )),
            };

            if delivery.success {
                self.migrations
                    .mark_email(row.id, EmailStatus::Sent, None)
                    .await?;
                counter!("price_migration_emails_total", "outcome" => "sent").increment(1);
                report.sent += 1;
            } else {
                let error = truncate_message(
                    delivery.error.as_deref().unwrap_or("Unknown email error"),
                    MAX_STORED_ERROR_CHARS,
                );
                self.migrations
                    .mark_email(row.id, EmailStatus::Failed, Some(error.clone()))
                    .await?;
                counter!("price_migration_emails_total", "outcome" => "failed").increment(1);
                tracing::warn!(
                    migration_id = %migration_id,
                    organisation_id = %row.organisation_id,
                    error = %error,
                    "Price migration email failed"
                );
                report.failed += 1;
                report.errors.push(CustomerFailure {
                    organisation_id: row.organisation_id,
                    error,
                });
            }
        }

        let sent_total = self
            .migrations
            .count_by_email_status(migration_id, EmailStatus::Sent)
            .await?;
        let sent_at = Utc::now();
        let scheduled_for = sent_at + Duration::days(NOTICE_PERIOD_DAYS);

        let changes = price_migration::ActiveModel {
            status: Set(MigrationStatus::EmailsSent),
            emails_sent_at: Set(Some(sent_at.fixed_offset())),
            migration_scheduled_for: Set(Some(scheduled_for.fixed_offset())),
            emails_sent_count: Set(sent_total as i32),
            total_customers: Set(candidates.len() as i32),
            ..Default::default()
        };
        if !self
            .migrations
            .transition(migration_id, &[MigrationStatus::Pending], changes)
            .await?
        {
            return Err(BillingError::invalid_state(format!(
                "Migration {migration_id} changed status while emails were being sent"
            )));
        }

        report.scheduled_for = scheduled_for;

        tracing::info!(
            migration_id = %migration_id,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            already_processed = report.already_processed,
            scheduled_for = %scheduled_for,
            "Price migration emails sent"
        );

        Ok(report)
    }

    /// Apply the new price to every still-pending customer of the migration.
    pub async fn execute(&self, migration_id: Uuid) -> Result<ExecutionReport, BillingError> {
        let migration = self.load(migration_id).await?;
        match migration.status {
            MigrationStatus::Completed => {
                return Err(BillingError::invalid_state(format!(
                    "Migration {migration_id} is already completed"
                )));
            }
            MigrationStatus::Cancelled => {
                return Err(BillingError::invalid_state(format!(
                    "Migration {migration_id} was cancelled"
                )));
            }
            MigrationStatus::Pending | MigrationStatus::EmailsSent => {}
        }

        let pending = self.migrations.pending_customers(migration_id).await?;
        tracing::info!(
            migration_id = %migration_id,
            status = %migration.status,
            pending = pending.len(),
            "Executing price migration"
        );

        let mut report = ExecutionReport {
            migration_id,
            completed: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        };
        let mut called_provider = false;

        for customer in pending {
            let Some(subscription_id) = customer.stripe_subscription_id.clone() else {
                self.record_outcome(
                    &customer,
                    CustomerMigrationStatus::Skipped,
                    None,
                    Some(NO_SUBSCRIPTION_ID.to_string()),
                    &mut report,
                )
                .await?;
                continue;
            };

            let Some(new_price_id) = customer.new_price_id.clone() else {
                let reason = format!(
                    "No new price ID for {}/{}",
                    customer.tier, customer.currency
                );
                self.record_outcome(
                    &customer,
                    CustomerMigrationStatus::Skipped,
                    None,
                    Some(reason),
                    &mut report,
                )
                .await?;
                continue;
            };

            if called_provider && !self.config.provider_delay().is_zero() {
                tokio::time::sleep(self.config.provider_delay()).await;
            }
            called_provider = true;

            match self
                .migrate_subscription(&customer, &subscription_id, &new_price_id)
                .await
            {
                Ok(item_id) => {
                    self.record_outcome(
                        &customer,
                        CustomerMigrationStatus::Completed,
                        Some(item_id),
                        None,
                        &mut report,
                    )
                    .await?;
                }
                Err(error) => {
                    tracing::warn!(
                        migration_id = %migration_id,
                        organisation_id = %customer.organisation_id,
                        subscription_id = %subscription_id,
                        error = %error,
                        "Subscription price update failed"
                    );
                    self.record_outcome(
                        &customer,
                        CustomerMigrationStatus::Failed,
                        None,
                        Some(truncate_message(&error.to_string(), MAX_STORED_ERROR_CHARS)),
                        &mut report,
                    )
                    .await?;
                }
            }
        }

        let completed_total = self
            .migrations
            .count_by_migration_status(migration_id, CustomerMigrationStatus::Completed)
            .await?;
        let failed_total = self
            .migrations
            .count_by_migration_status(migration_id, CustomerMigrationStatus::Failed)
            .await?;

        let changes = price_migration::ActiveModel {
            status: Set(MigrationStatus::Completed),
            migration_completed_at: Set(Some(Utc::now().fixed_offset())),
            migrations_completed: Set(completed_total as i32),
            migrations_failed: Set(failed_total as i32),
            ..Default::default()
        };
        let finished = self
            .migrations
            .transition(
                migration_id,
                &[MigrationStatus::Pending, MigrationStatus::EmailsSent],
                changes,
            )
            .await?;
        if !finished {
            tracing::warn!(
                migration_id = %migration_id,
                "Migration status changed during execution; leaving it as is"
            );
        }

        tracing::info!(
            migration_id = %migration_id,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "Price migration executed"
        );

        Ok(report)
    }

    /// Cancel a migration that has not completed. Customer rows are left as they are.
    pub async fn cancel(&self, migration_id: Uuid) -> Result<MigrationModel, BillingError> {
        let migration = self.load(migration_id).await?;
        match migration.status {
            MigrationStatus::Completed => {
                return Err(BillingError::validation(
                    "Cannot cancel a completed migration",
                ));
            }
            MigrationStatus::Cancelled => return Ok(migration),
            MigrationStatus::Pending | MigrationStatus::EmailsSent => {}
        }

        let changes = price_migration::ActiveModel {
            status: Set(MigrationStatus::Cancelled),
            ..Default::default()
        };
        if !self
            .migrations
            .transition(
                migration_id,
                &[MigrationStatus::Pending, MigrationStatus::EmailsSent],
                changes,
            )
            .await?
        {
            return Err(BillingError::invalid_state(format!(
                "Migration {migration_id} changed status before it could be cancelled"
            )));
        }

        tracing::info!(migration_id = %migration_id, previous_status = %migration.status, "Price migration cancelled");
        self.load(migration_id).await
    }

    pub async fn details(&self, migration_id: Uuid) -> Result<MigrationDetails, BillingError> {
        let migration = self.load(migration_id).await?;
        let customers = self.migrations.customers(migration_id).await?;
        let summary = CustomerSummary::from_customers(&customers);
        Ok(MigrationDetails {
            migration,
            customers,
            summary,
        })
    }

    pub async fn list(&self) -> Result<Vec<MigrationModel>, BillingError> {
        Ok(self.migrations.list().await?)
    }

    /// Migrations whose notice period has elapsed and that are ready to execute.
    pub async fn pending_migrations(&self) -> Result<Vec<MigrationModel>, BillingError> {
        Ok(self
            .migrations
            .find_due(Utc::now().fixed_offset())
            .await?)
    }

    /// Preview of the customers a migration would notify, with live provider data.
    pub async fn customers_to_migrate(
        &self,
        migration_id: Uuid,
    ) -> Result<Vec<MigrationCandidate>, BillingError> {
        let migration = self.load(migration_id).await?;
        let plan = MigrationPlan::try_from(&migration)?;
        self.resolve_candidates(&plan).await
    }

    async fn load(&self, migration_id: Uuid) -> Result<MigrationModel, BillingError> {
        self.migrations
            .find_by_id(migration_id)
            .await?
            .ok_or_else(|| BillingError::not_found(format!("Migration {migration_id} not found")))
    }

    async fn resolve_candidates(
        &self,
        plan: &MigrationPlan,
    ) -> Result<Vec<MigrationCandidate>, BillingError> {
        let organisations = self
            .organisations
            .find_eligible(plan.allowlist.as_deref())
            .await?;

        let mut candidates = Vec::with_capacity(organisations.len());
        for organisation in organisations {
            candidates.push(self.candidate_for(organisation, &plan.price_map).await);
        }
        Ok(candidates)
    }

    /// Build a candidate, enriching it from the provider. A provider failure
    /// leaves the enrichment fields empty.
    async fn candidate_for(
        &self,
        organisation: organisation::Model,
        price_map: &PriceMap,
    ) -> MigrationCandidate {
        let mut subscription_item_id = None;
        let mut current_price_id = None;

        if let Some(subscription_id) = organisation.stripe_subscription_id.as_deref() {
            match self.provider.retrieve_subscription(subscription_id).await {
                Ok(subscription) => {
                    if let Some(item) = subscription.primary_item() {
                        subscription_item_id = Some(item.id.clone());
                        current_price_id = Some(item.price.id.clone());
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        organisation_id = %organisation.id,
                        subscription_id,
                        error = %error,
                        "Could not retrieve subscription; continuing without provider data"
                    );
                }
            }
        }

        MigrationCandidate {
            organisation_id: organisation.id,
            new_price_id: price_map
                .resolve(&organisation.tier, &organisation.currency)
                .map(str::to_string),
            email: organisation.contact_email().map(str::to_string),
            organisation_name: organisation.name,
            tier: organisation.tier,
            currency: organisation.currency,
            stripe_customer_id: organisation.stripe_customer_id,
            stripe_subscription_id: organisation.stripe_subscription_id,
            stripe_subscription_item_id: subscription_item_id,
            current_price_id,
        }
    }

    fn notice_for(
        &self,
        candidate: &MigrationCandidate,
        row: &CustomerModel,
        plan: &MigrationPlan,
        to: String,
        effective_date: DateTime<Utc>,
    ) -> Option<EmailMessage> {
        let tier: Tier = row.tier.parse().ok()?;
        let currency: Currency = row.currency.parse().ok()?;

        let notice = render_notice(&NoticeContext {
            organisation_name: &candidate.organisation_name,
            tier,
            currency,
            old_pricing: &plan.old_pricing,
            new_pricing: &plan.new_pricing,
            effective_date,
        });

        Some(EmailMessage {
            to,
            subject: notice.subject,
            html: notice.html,
            display_name: Some(candidate.organisation_name.clone()),
        })
    }

    /// Swap the subscription item's price. Returns the item id that was updated.
    async fn migrate_subscription(
        &self,
        customer: &CustomerModel,
        subscription_id: &str,
        new_price_id: &str,
    ) -> Result<String, ProviderError> {
        let item_id = match customer.stripe_subscription_item_id.clone() {
            Some(item_id) => item_id,
            None => self
                .provider
                .retrieve_subscription(subscription_id)
                .await?
                .primary_item()
                .map(|item| item.id.clone())
                .ok_or_else(|| ProviderError::NoSubscriptionItems(subscription_id.to_string()))?,
        };

        self.provider
            .update_subscription_item_price(subscription_id, &item_id, new_price_id)
            .await?;

        Ok(item_id)
    }

    async fn record_outcome(
        &self,
        customer: &CustomerModel,
        status: CustomerMigrationStatus,
        subscription_item_id: Option<String>,
        error: Option<String>,
        report: &mut ExecutionReport,
    ) -> Result<(), BillingError> {
        let updated = self
            .migrations
            .mark_migration(customer.id, status, subscription_item_id, error.clone())
            .await?;
        if !updated {
            tracing::warn!(
                customer_id = %customer.id,
                "Customer row is no longer pending; outcome not recorded"
            );
            return Ok(());
        }

        let outcome = status.as_str();
        counter!("price_migration_customers_total", "outcome" => outcome).increment(1);

        match status {
            CustomerMigrationStatus::Completed => report.completed += 1,
            CustomerMigrationStatus::Failed => report.failed += 1,
            CustomerMigrationStatus::Skipped => report.skipped += 1,
            CustomerMigrationStatus::Pending => {}
        }

        if let Some(error) = error
            && status != CustomerMigrationStatus::Completed
        {
            report.errors.push(CustomerFailure {
                organisation_id: customer.organisation_id,
                error,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(email: EmailStatus, migration: CustomerMigrationStatus) -> CustomerModel {
        let now = Utc::now().fixed_offset();
        CustomerModel {
            id: Uuid::new_v4(),
            migration_id: Uuid::nil(),
            organisation_id: Uuid::new_v4(),
            tier: "basic".to_string(),
            currency: "gbp".to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_subscription_item_id: None,
            current_price_id: None,
            new_price_id: None,
            email: None,
            email_status: email,
            email_sent_at: None,
            email_error: None,
            migration_status: migration,
            migrated_at: None,
            migration_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_counts_each_status() {
        let customers = vec![
            customer(EmailStatus::Sent, CustomerMigrationStatus::Completed),
            customer(EmailStatus::Sent, CustomerMigrationStatus::Failed),
            customer(EmailStatus::Skipped, CustomerMigrationStatus::Completed),
        ];

        let summary = CustomerSummary::from_customers(&customers);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.email.get("sent"), Some(&2));
        assert_eq!(summary.email.get("skipped"), Some(&1));
        assert_eq!(summary.migration.get("completed"), Some(&2));
        assert_eq!(summary.migration.get("failed"), Some(&1));
        assert_eq!(summary.migration.get("pending"), None);
    }

    #[test]
    fn create_request_accepts_missing_allowlist() {
        let json = serde_json::json!({
            "name": "2026 repricing",
            "old_pricing": {"tiers": {"basic": {"gbp": {"monthly": 1200}}}},
            "new_pricing": {"tiers": {"basic": {"gbp": {"monthly": 1400}}}},
            "new_price_ids": {"basic": {"gbp": "price_basic_gbp_2026"}}
        });
        let request: CreateMigrationRequest = serde_json::from_value(json).unwrap();
        assert!(request.organisation_ids.is_none());
        assert_eq!(
            request.new_price_ids.get(Tier::Basic, Currency::Gbp),
            Some("price_basic_gbp_2026")
        );
    }
}
