//! Admin facade tests: uniform response envelope over the real services.

use std::sync::Arc;

use billing_ops::api::AdminApi;
use billing_ops::config::AppConfig;
use billing_ops::repositories::JobLeaseRepository;
use billing_ops::scheduler::{BillingScheduler, CONSOLIDATION_JOB};
use billing_ops::usage_consolidation::UsageConsolidator;
use chrono::Duration;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{
    FakeProvider, OrgFixture, RecordingNotifier, insert_organisation, migration_service,
    no_delay, sample_request,
};

fn admin_api(db: Arc<DatabaseConnection>) -> AdminApi {
    let config = Arc::new(AppConfig {
        price_migration: no_delay(),
        ..AppConfig::default()
    });
    let migrations = Arc::new(migration_service(
        db.clone(),
        FakeProvider::new(),
        RecordingNotifier::new(),
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
    AdminApi::new(migrations, scheduler)
}

#[tokio::test]
async fn lifecycle_responses_share_one_envelope() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    insert_organisation(&db, OrgFixture::new("acme", "basic", "gbp"))
        .await
        .unwrap();
    let api = admin_api(db);

    let created = api
        .create_migration(sample_request("Envelope"), "ops")
        .await
        .to_json();
    assert_eq!(created["success"], true);
    assert_eq!(created["migration"]["status"], "pending");
    assert_eq!(created["migration"]["total_customers"], 1);
    let id: Uuid = created["migration"]["id"].as_str().unwrap().parse().unwrap();

    let sent = api.send_migration_emails(id).await.to_json();
    assert_eq!(sent["success"], true);
    assert_eq!(sent["sent"], 1);

    let details = api.get_migration_details(id).await.to_json();
    assert_eq!(details["migration"]["status"], "emails_sent");
    assert_eq!(details["summary"]["total"], 1);
    assert_eq!(details["summary"]["email"]["sent"], 1);
    assert_eq!(details["customers"].as_array().unwrap().len(), 1);

    let executed = api.execute_migration(id).await.to_json();
    assert_eq!(executed["success"], true);
    assert_eq!(executed["completed"], 1);

    let cancelled = api.cancel_migration(id).await.to_json();
    assert_eq!(cancelled["success"], false);
    assert_eq!(cancelled["code"], "VALIDATION_FAILED");
    assert_eq!(cancelled["error"], "Cannot cancel a completed migration");

    let listed = api.list_migrations().await.to_json();
    assert_eq!(listed["migrations"].as_array().unwrap().len(), 1);

    let pending = api.get_pending_migrations().await.to_json();
    assert_eq!(pending["migrations"], serde_json::json!([]));
}

#[tokio::test]
async fn failures_carry_codes() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    let api = admin_api(db);

    let mut unnamed = sample_request("");
    unnamed.name.clear();
    let created = api.create_migration(unnamed, "ops").await.to_json();
    assert_eq!(
        created,
        serde_json::json!({
            "success": false,
            "error": "Migration name is required",
            "code": "VALIDATION_FAILED"
        })
    );

    let missing = api.get_customers_to_migrate(Uuid::new_v4()).await.to_json();
    assert_eq!(missing["success"], false);
    assert_eq!(missing["code"], "NOT_FOUND");
}

#[tokio::test]
async fn consolidation_reports_job_in_progress() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    let api = admin_api(db.clone());

    let ran = api.run_consolidation_now().await.to_json();
    assert_eq!(ran["success"], true);
    assert_eq!(ran["sessions_consolidated"], 0);

    JobLeaseRepository::new(db)
        .try_acquire(CONSOLIDATION_JOB, "other-instance", Duration::minutes(5))
        .await
        .unwrap();
    let busy = api.run_consolidation_now().await.to_json();
    assert_eq!(busy["success"], false);
    assert_eq!(busy["code"], "JOB_IN_PROGRESS");
}

#[tokio::test]
async fn from_config_wires_unconfigured_collaborators() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    insert_organisation(&db, OrgFixture::new("acme", "basic", "gbp"))
        .await
        .unwrap();
    let api = AdminApi::from_config(Arc::new(AppConfig::default()), db).unwrap();

    let created = api
        .create_migration(sample_request("Offline"), "ops")
        .await
        .to_json();
    let id: Uuid = created["migration"]["id"].as_str().unwrap().parse().unwrap();

    // Without credentials every delivery and provider lookup fails per customer.
    let sent = api.send_migration_emails(id).await.to_json();
    assert_eq!(sent["success"], true);
    assert_eq!(sent["failed"], 1);
    assert_eq!(sent["errors"][0]["error"], "Email service not configured");
}
