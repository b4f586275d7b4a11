//! # Admin API Facade
//!
//! Operations exposed to the admin dashboard and the operator CLI. Every call
//! returns an [`ApiResponse`]: `{"success": true, ...payload}` on success and
//! `{"success": false, "error": ..., "code": ...}` on failure.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use uuid::Uuid;

use crate::billing_provider::{StripeClient, SubscriptionProvider, UnconfiguredProvider};
use crate::config::AppConfig;
use crate::error::BillingError;
use crate::mail::{HttpMailer, Notifier, UnconfiguredNotifier};
use crate::models::price_migration::Model as MigrationModel;
use crate::price_migration::{
    CreateMigrationRequest, ExecutionReport, MigrationCandidate, MigrationDetails,
    PriceMigrationService, SendEmailsReport,
};
use crate::repositories::JobLeaseRepository;
use crate::scheduler::{BillingScheduler, JobRun};
use crate::usage_consolidation::{ConsolidationReport, UsageConsolidator};

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(code: &'static str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            code: Some(code),
        }
    }

    fn from_result(operation: &'static str, result: Result<T, BillingError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => {
                match &err {
                    BillingError::Database(_) | BillingError::Internal(_) => {
                        tracing::error!(operation, error = %err, code = err.code(), "Admin operation failed")
                    }
                    _ => {
                        tracing::info!(operation, error = %err, code = err.code(), "Admin operation rejected")
                    }
                }
                Self::failure(err.code(), err.to_string())
            }
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            serde_json::json!({
                "success": false,
                "error": format!("failed to serialize response: {err}"),
                "code": "INTERNAL_ERROR",
            })
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationPayload {
    pub migration: MigrationModel,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationsPayload {
    pub migrations: Vec<MigrationModel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomersPayload {
    pub customers: Vec<MigrationCandidate>,
}

pub struct AdminApi {
    migrations: Arc<PriceMigrationService>,
    scheduler: Arc<BillingScheduler>,
}

impl AdminApi {
    pub fn new(migrations: Arc<PriceMigrationService>, scheduler: Arc<BillingScheduler>) -> Self {
        Self {
            migrations,
            scheduler,
        }
    }

    /// Wire the services from configuration. Missing Stripe or mail
    /// credentials (allowed in local/test profiles) yield collaborators that
    /// report every call as failed.
    pub fn from_config(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
    ) -> Result<Self, BillingError> {
        let provider: Arc<dyn SubscriptionProvider> = match &config.stripe_secret_key {
            Some(key) => Arc::new(StripeClient::new(
                key.clone(),
                config.stripe_api_base.clone(),
                config.http_timeout(),
            )?),
            None => {
                tracing::warn!("BILLING_STRIPE_SECRET_KEY not set; subscription updates will fail");
                Arc::new(UnconfiguredProvider)
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.mail_api_key {
            Some(key) => Arc::new(
                HttpMailer::new(
                    key.clone(),
                    config.mail_api_base.clone(),
                    config.mail_from_address.clone(),
                    config.mail_from_name.clone(),
                    config.http_timeout(),
                )
                .map_err(|err| BillingError::Internal(err.to_string()))?,
            ),
            None => {
                tracing::warn!("BILLING_MAIL_API_KEY not set; notices will not be delivered");
                Arc::new(UnconfiguredNotifier)
            }
        };

        let migrations = Arc::new(PriceMigrationService::new(
            db.clone(),
            config.price_migration.clone(),
            provider,
            notifier,
        ));
        let consolidator = Arc::new(UsageConsolidator::new(
            db.clone(),
            config.consolidation.clone(),
        ));
        let scheduler = Arc::new(BillingScheduler::new(
            config,
            migrations.clone(),
            consolidator,
            JobLeaseRepository::new(db),
        ));

        Ok(Self::new(migrations, scheduler))
    }

    pub fn scheduler(&self) -> Arc<BillingScheduler> {
        self.scheduler.clone()
    }

    pub async fn create_migration(
        &self,
        request: CreateMigrationRequest,
        created_by: &str,
    ) -> ApiResponse<MigrationPayload> {
        let result = self
            .migrations
            .create(request, created_by)
            .await
            .map(|migration| MigrationPayload { migration });
        ApiResponse::from_result("create_migration", result)
    }

    pub async fn send_migration_emails(&self, migration_id: Uuid) -> ApiResponse<SendEmailsReport> {
        ApiResponse::from_result(
            "send_migration_emails",
            self.migrations.send_emails(migration_id).await,
        )
    }

    pub async fn execute_migration(&self, migration_id: Uuid) -> ApiResponse<ExecutionReport> {
        ApiResponse::from_result(
            "execute_migration",
            self.migrations.execute(migration_id).await,
        )
    }

    pub async fn cancel_migration(&self, migration_id: Uuid) -> ApiResponse<MigrationPayload> {
        let result = self
            .migrations
            .cancel(migration_id)
            .await
            .map(|migration| MigrationPayload { migration });
        ApiResponse::from_result("cancel_migration", result)
    }

    pub async fn get_migration_details(&self, migration_id: Uuid) -> ApiResponse<MigrationDetails> {
        ApiResponse::from_result(
            "get_migration_details",
            self.migrations.details(migration_id).await,
        )
    }

    pub async fn list_migrations(&self) -> ApiResponse<MigrationsPayload> {
        let result = self
            .migrations
            .list()
            .await
            .map(|migrations| MigrationsPayload { migrations });
        ApiResponse::from_result("list_migrations", result)
    }

    pub async fn get_pending_migrations(&self) -> ApiResponse<MigrationsPayload> {
        let result = self
            .migrations
            .pending_migrations()
            .await
            .map(|migrations| MigrationsPayload { migrations });
        ApiResponse::from_result("get_pending_migrations", result)
    }

    pub async fn get_customers_to_migrate(
        &self,
        migration_id: Uuid,
    ) -> ApiResponse<CustomersPayload> {
        let result = self
            .migrations
            .customers_to_migrate(migration_id)
            .await
            .map(|customers| CustomersPayload { customers });
        ApiResponse::from_result("get_customers_to_migrate", result)
    }

    /// Run the consolidation job now, under the same lease as the scheduler.
    pub async fn run_consolidation_now(&self) -> ApiResponse<ConsolidationReport> {
        match self.scheduler.run_consolidation().await {
            Ok(JobRun::Ran { report }) => ApiResponse::ok(report),
            Ok(JobRun::Skipped) => ApiResponse::failure(
                "JOB_IN_PROGRESS",
                "Usage consolidation is already running",
            ),
            Err(err) => ApiResponse::from_result("run_consolidation_now", Err(err)),
        }
    }
}
