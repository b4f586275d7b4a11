//! Integration tests for the usage consolidation job.

use std::sync::Arc;

use billing_ops::config::ConsolidationConfig;
use billing_ops::models::SessionStatus;
use billing_ops::repositories::UsageRepository;
use billing_ops::usage_consolidation::{UNKNOWN_LANGUAGE, UsageConsolidator};
use sea_orm::{DatabaseConnection, Set};
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{insert_records, insert_session};

fn consolidator(db: Arc<DatabaseConnection>) -> UsageConsolidator {
    UsageConsolidator::new(
        db,
        ConsolidationConfig {
            retention_days: 60,
            batch_size: 50,
            min_rows: 5,
        },
    )
}

fn total_characters(records: &[billing_ops::models::usage_record::Model]) -> i64 {
    records.iter().map(|r| r.character_count).sum()
}

#[tokio::test]
async fn consolidation_preserves_character_totals() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    let org = Uuid::new_v4();
    let session = insert_session(&db, org, SessionStatus::Completed, 90)
        .await
        .unwrap();
    insert_records(
        &db,
        &session,
        &[
            (Some("fr"), 120, 3),
            (Some("de"), 80, 2),
            (Some("fr"), 45, 9),
            (None, 10, 1),
            (Some("de"), 5, 4),
            (Some("fr"), 1, 1),
            (None, 2, 2),
        ],
    )
    .await
    .unwrap();

    let report = consolidator(db.clone()).consolidate_old_sessions().await.unwrap();
    assert_eq!(report.sessions_consolidated, 1);
    assert_eq!(report.records_removed, 7);
    assert_eq!(report.records_created, 3);
    assert_eq!(report.net_reduction(), 4);
    assert!(report.errors.is_empty());

    let repo = UsageRepository::new(db);
    let rows = repo.records_for_session(session.id).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(total_characters(&rows), 263);
    assert!(rows.iter().all(|r| r.is_consolidated));
    assert!(rows.iter().all(|r| r.organisation_id == org));

    let fr = rows
        .iter()
        .find(|r| r.language.as_deref() == Some("fr"))
        .unwrap();
    assert_eq!(fr.character_count, 166);
    assert_eq!(fr.client_count, 9);
    assert_eq!(fr.created_at, session.started_at);

    let unknown = rows
        .iter()
        .find(|r| r.language.as_deref() == Some(UNKNOWN_LANGUAGE))
        .unwrap();
    assert_eq!(unknown.character_count, 12);
}

#[tokio::test]
async fn five_rows_are_left_alone_and_six_are_folded() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    let five = insert_session(&db, Uuid::new_v4(), SessionStatus::Completed, 90)
        .await
        .unwrap();
    insert_records(&db, &five, &[(Some("en"), 10, 1); 5])
        .await
        .unwrap();
    let six = insert_session(&db, Uuid::new_v4(), SessionStatus::Completed, 90)
        .await
        .unwrap();
    insert_records(
        &db,
        &six,
        &[
            (Some("en"), 10, 1),
            (Some("en"), 10, 1),
            (Some("es"), 10, 1),
            (Some("en"), 10, 1),
            (Some("es"), 10, 1),
            (Some("en"), 10, 1),
        ],
    )
    .await
    .unwrap();

    let report = consolidator(db.clone()).consolidate_old_sessions().await.unwrap();
    assert_eq!(report.sessions_consolidated, 1);

    let repo = UsageRepository::new(db);
    let untouched = repo.records_for_session(five.id).await.unwrap();
    assert_eq!(untouched.len(), 5);
    assert!(untouched.iter().all(|r| !r.is_consolidated));

    let folded = repo.records_for_session(six.id).await.unwrap();
    assert_eq!(folded.len(), 2);
    assert_eq!(total_characters(&folded), 60);
}

#[tokio::test]
async fn second_run_finds_nothing_to_do() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    let session = insert_session(&db, Uuid::new_v4(), SessionStatus::Recovered, 61)
        .await
        .unwrap();
    insert_records(&db, &session, &[(Some("it"), 7, 1); 8])
        .await
        .unwrap();

    let job = consolidator(db.clone());
    let first = job.consolidate_old_sessions().await.unwrap();
    assert_eq!(first.sessions_consolidated, 1);

    let second = job.consolidate_old_sessions().await.unwrap();
    assert_eq!(second.sessions_consolidated, 0);
    assert_eq!(second.records_removed, 0);

    let rows = UsageRepository::new(db)
        .records_for_session(session.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].character_count, 56);
}

#[tokio::test]
async fn recent_and_unfinished_sessions_are_excluded() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    let recent = insert_session(&db, Uuid::new_v4(), SessionStatus::Completed, 30)
        .await
        .unwrap();
    let active = insert_session(&db, Uuid::new_v4(), SessionStatus::Active, 90)
        .await
        .unwrap();
    let failed = insert_session(&db, Uuid::new_v4(), SessionStatus::Failed, 90)
        .await
        .unwrap();
    for session in [&recent, &active, &failed] {
        insert_records(&db, session, &[(Some("en"), 1, 1); 10])
            .await
            .unwrap();
    }

    let report = consolidator(db.clone()).consolidate_old_sessions().await.unwrap();
    assert_eq!(report.sessions_consolidated, 0);
    assert_eq!(report.records_removed, 0);

    let repo = UsageRepository::new(db);
    for session in [&recent, &active, &failed] {
        assert_eq!(repo.records_for_session(session.id).await.unwrap().len(), 10);
    }
}

#[tokio::test]
async fn batch_size_limits_sessions_per_run() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    for days in [100, 90, 80] {
        let session = insert_session(&db, Uuid::new_v4(), SessionStatus::Completed, days)
            .await
            .unwrap();
        insert_records(&db, &session, &[(Some("en"), 1, 1); 6])
            .await
            .unwrap();
    }

    let job = UsageConsolidator::new(
        db.clone(),
        ConsolidationConfig {
            retention_days: 60,
            batch_size: 2,
            min_rows: 5,
        },
    );

    assert_eq!(job.consolidate_old_sessions().await.unwrap().sessions_consolidated, 2);
    assert_eq!(job.consolidate_old_sessions().await.unwrap().sessions_consolidated, 1);
    assert_eq!(job.consolidate_old_sessions().await.unwrap().sessions_consolidated, 0);
}

#[tokio::test]
async fn replace_rolls_back_when_an_original_is_missing() {
    let db = test_utils::setup_test_db_arc().await.unwrap();
    let session = insert_session(&db, Uuid::new_v4(), SessionStatus::Completed, 90)
        .await
        .unwrap();
    let originals = insert_records(&db, &session, &[(Some("en"), 4, 1), (Some("en"), 6, 1)])
        .await
        .unwrap();

    let mut ids: Vec<Uuid> = originals.iter().map(|r| r.id).collect();
    ids.push(Uuid::new_v4());
    let replacement = billing_ops::models::usage_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        session_id: Set(session.id),
        organisation_id: Set(session.organisation_id),
        language: Set(Some("en".to_string())),
        character_count: Set(10),
        client_count: Set(1),
        date: Set(session.started_at.date_naive()),
        is_consolidated: Set(true),
        created_at: Set(session.started_at),
    };

    let repo = UsageRepository::new(db);
    let err = repo
        .replace_records(&ids, vec![replacement])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expected to remove 3 usage records, found 2"));

    let rows = repo.records_for_session(session.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.is_consolidated));
    assert_eq!(total_characters(&rows), 10);
}
