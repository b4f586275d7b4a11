//! Test utilities for database testing.
//!
//! In-memory SQLite setup with migrations applied, row fixtures for
//! organisations and usage, and in-process fakes for the payment provider
//! and the mailer.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use billing_ops::billing_provider::{
    Price, ProviderError, Subscription, SubscriptionItem, SubscriptionProvider,
};
use billing_ops::config::PriceMigrationConfig;
use billing_ops::mail::{DeliveryReport, EmailMessage, Notifier};
use billing_ops::models::usage_session::SessionStatus;
use billing_ops::models::{organisation, usage_record, usage_session};
use billing_ops::price_migration::{CreateMigrationRequest, PriceMigrationService};
use billing_ops::pricing::{Currency, PriceMap, PriceSheet, Tier, TierPrice};
use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set, Statement};
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;

    Migrator::up(&db, None).await?;

    // Fixtures insert child rows without their parents.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// Organisation row to insert. Defaults describe an eligible customer.
#[derive(Debug, Clone)]
pub struct OrgFixture {
    pub name: String,
    pub tier: String,
    pub currency: String,
    pub subscription_status: String,
    pub stripe_subscription_id: Option<String>,
    pub billing_email: Option<String>,
    pub owner_email: Option<String>,
}

impl OrgFixture {
    pub fn new(name: &str, tier: &str, currency: &str) -> Self {
        Self {
            name: name.to_string(),
            tier: tier.to_string(),
            currency: currency.to_string(),
            subscription_status: "active".to_string(),
            stripe_subscription_id: Some(format!("sub_{name}")),
            billing_email: Some(format!("billing@{name}.example")),
            owner_email: None,
        }
    }

    pub fn without_email(mut self) -> Self {
        self.billing_email = None;
        self.owner_email = None;
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.subscription_status = status.to_string();
        self
    }
}

pub async fn insert_organisation(
    db: &DatabaseConnection,
    fixture: OrgFixture,
) -> Result<organisation::Model> {
    let now = Utc::now().fixed_offset();
    let model = organisation::ActiveModel {
        id: Set(Uuid::new_v4()),
        stripe_customer_id: Set(Some(format!("cus_{}", fixture.name))),
        name: Set(fixture.name),
        tier: Set(fixture.tier),
        currency: Set(fixture.currency),
        subscription_status: Set(fixture.subscription_status),
        stripe_subscription_id: Set(fixture.stripe_subscription_id),
        billing_email: Set(fixture.billing_email),
        owner_email: Set(fixture.owner_email),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(model)
}

/// Price change covering every tier in GBP and USD.
pub fn sample_request(name: &str) -> CreateMigrationRequest {
    let mut old_pricing = PriceSheet::default();
    let mut new_pricing = PriceSheet::default();
    let mut new_price_ids = PriceMap::new();

    for (tier, old_monthly, new_monthly) in [
        (Tier::Basic, 1200, 1400),
        (Tier::Standard, 2900, 3200),
        (Tier::Pro, 7900, 8900),
    ] {
        for currency in [Currency::Gbp, Currency::Usd] {
            old_pricing = old_pricing.with_tier_price(
                tier,
                currency,
                TierPrice {
                    monthly: old_monthly,
                    annual: Some(old_monthly * 10),
                },
            );
            new_pricing = new_pricing.with_tier_price(
                tier,
                currency,
                TierPrice {
                    monthly: new_monthly,
                    annual: Some(new_monthly * 10),
                },
            );
            new_price_ids.insert(tier, currency, format!("price_{tier}_{currency}_2026"));
        }
    }

    CreateMigrationRequest {
        name: name.to_string(),
        old_pricing: old_pricing.with_credit_price(Currency::Gbp, 500),
        new_pricing: new_pricing.with_credit_price(Currency::Gbp, 600),
        new_price_ids,
        organisation_ids: None,
    }
}

pub fn no_delay() -> PriceMigrationConfig {
    PriceMigrationConfig {
        email_delay_ms: 0,
        provider_delay_ms: 0,
    }
}

pub fn migration_service(
    db: Arc<DatabaseConnection>,
    provider: Arc<FakeProvider>,
    notifier: Arc<RecordingNotifier>,
) -> PriceMigrationService {
    PriceMigrationService::new(db, no_delay(), provider, notifier)
}

pub async fn insert_session(
    db: &DatabaseConnection,
    organisation_id: Uuid,
    status: SessionStatus,
    started_days_ago: i64,
) -> Result<usage_session::Model> {
    let started_at = (Utc::now() - Duration::days(started_days_ago)).fixed_offset();
    let model = usage_session::ActiveModel {
        id: Set(Uuid::new_v4()),
        organisation_id: Set(organisation_id),
        status: Set(status),
        started_at: Set(started_at),
        ended_at: Set(Some(started_at + Duration::hours(1))),
    }
    .insert(db)
    .await?;
    Ok(model)
}

/// Insert one unconsolidated row per `(language, characters, clients)` entry,
/// one minute apart starting at the session start.
pub async fn insert_records(
    db: &DatabaseConnection,
    session: &usage_session::Model,
    rows: &[(Option<&str>, i64, i32)],
) -> Result<Vec<usage_record::Model>> {
    let mut inserted = Vec::with_capacity(rows.len());
    for (offset, (language, characters, clients)) in rows.iter().enumerate() {
        let created_at = session.started_at + Duration::minutes(offset as i64);
        let model = usage_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session.id),
            organisation_id: Set(session.organisation_id),
            language: Set(language.map(str::to_string)),
            character_count: Set(*characters),
            client_count: Set(*clients),
            date: Set(created_at.date_naive()),
            is_consolidated: Set(false),
            created_at: Set(created_at),
        }
        .insert(db)
        .await?;
        inserted.push(model);
    }
    Ok(inserted)
}

/// Item id the fake provider reports for a subscription.
pub fn item_id_for(subscription_id: &str) -> String {
    format!("si_{subscription_id}")
}

/// Subscription provider that keeps subscriptions in memory. Every
/// subscription has a single item priced at `price_old` unless updated.
#[derive(Default)]
pub struct FakeProvider {
    prices: Mutex<HashMap<String, String>>,
    failing_lookups: Mutex<HashSet<String>>,
    failing_updates: Mutex<HashSet<String>>,
    updates: Mutex<Vec<(String, String, String)>>,
    lookups: Mutex<u64>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_lookup(&self, subscription_id: &str) {
        self.failing_lookups
            .lock()
            .unwrap()
            .insert(subscription_id.to_string());
    }

    pub fn fail_update(&self, subscription_id: &str) {
        self.failing_updates
            .lock()
            .unwrap()
            .insert(subscription_id.to_string());
    }

    /// Recorded `(subscription, item, price)` updates.
    pub fn updates(&self) -> Vec<(String, String, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> u64 {
        *self.lookups.lock().unwrap()
    }

    pub fn current_price(&self, subscription_id: &str) -> String {
        self.prices
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .unwrap_or_else(|| "price_old".to_string())
    }

    fn subscription(&self, subscription_id: &str) -> Subscription {
        Subscription {
            id: subscription_id.to_string(),
            status: Some("active".to_string()),
            items: vec![SubscriptionItem {
                id: item_id_for(subscription_id),
                price: Price {
                    id: self.current_price(subscription_id),
                    currency: None,
                },
            }],
        }
    }
}

#[async_trait]
impl SubscriptionProvider for FakeProvider {
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, ProviderError> {
        *self.lookups.lock().unwrap() += 1;
        if self.failing_lookups.lock().unwrap().contains(subscription_id) {
            return Err(ProviderError::Api {
                status: 404,
                message: format!("No such subscription: '{subscription_id}'"),
            });
        }
        Ok(self.subscription(subscription_id))
    }

    async fn update_subscription_item_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        new_price_id: &str,
    ) -> Result<Subscription, ProviderError> {
        self.updates.lock().unwrap().push((
            subscription_id.to_string(),
            item_id.to_string(),
            new_price_id.to_string(),
        ));
        if self.failing_updates.lock().unwrap().contains(subscription_id) {
            return Err(ProviderError::Api {
                status: 400,
                message: "Your card was declined.".to_string(),
            });
        }
        self.prices
            .lock()
            .unwrap()
            .insert(subscription_id.to_string(), new_price_id.to_string());
        Ok(self.subscription(subscription_id))
    }
}

/// Notifier that records every message and fails for chosen recipients.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
    failing_recipients: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, message: &EmailMessage) -> DeliveryReport {
        if self.failing_recipients.lock().unwrap().contains(&message.to) {
            return DeliveryReport::failed("Mailbox unavailable");
        }
        self.sent.lock().unwrap().push(message.clone());
        DeliveryReport::delivered()
    }
}
