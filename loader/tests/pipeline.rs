use std::collections::BTreeMap;

use config::shared::{CaseFold, ColumnSpec, FieldRule, LoadProfile};
use loader::error::ErrorKind;
use loader::pipeline::{Pipeline, RunPhase};
use loader::source::MemorySource;
use loader::store::MemoryStore;
use loader::types::{RawRecord, RawValue, Value};
use telemetry::tracing::init_test_tracing;

fn field_visits_profile() -> LoadProfile {
    LoadProfile {
        name: "field_visits".to_string(),
        table: "field_visits".to_string(),
        columns: vec![
            ColumnSpec {
                name: "document".to_string(),
                rule: FieldRule::Document { min_digits: 8 },
            },
            ColumnSpec {
                name: "zone".to_string(),
                rule: FieldRule::Text {
                    case: Some(CaseFold::Upper),
                    strip_accents: true,
                },
            },
            ColumnSpec {
                name: "visit_date".to_string(),
                rule: FieldRule::Date {
                    formats: vec!["%d/%m/%Y".to_string(), "%Y-%m-%d %H:%M:%S".to_string()],
                },
            },
            ColumnSpec {
                name: "latitude".to_string(),
                rule: FieldRule::Numeric { decimals: 6 },
            },
            ColumnSpec {
                name: "phone".to_string(),
                rule: FieldRule::Phone {
                    country_code: "51".to_string(),
                    min_digits: 9,
                    max_digits: 9,
                },
            },
            ColumnSpec {
                name: "email".to_string(),
                rule: FieldRule::Email,
            },
        ],
        key_fields: vec![
            "document".to_string(),
            "zone".to_string(),
            "visit_date".to_string(),
        ],
        partition_field: Some("visit_date".to_string()),
        column_mapping: BTreeMap::from([("DOCUMENTO".to_string(), "document".to_string())]),
        audit_enabled: true,
        key_sentinel: "UNKNOWN".to_string(),
        insert_chunk_size: 500,
    }
}

fn visit(document: &str, zone: &str, date: &str, latitude: f64, email: &str) -> RawRecord {
    RawRecord::new(vec![
        ("DOCUMENTO".to_string(), RawValue::Text(document.to_string())),
        ("zone".to_string(), RawValue::Text(zone.to_string())),
        ("visit_date".to_string(), RawValue::Text(date.to_string())),
        ("latitude".to_string(), RawValue::Number(latitude)),
        (
            "phone".to_string(),
            RawValue::Text("+51 959 673 421".to_string()),
        ),
        ("email".to_string(), RawValue::Text(email.to_string())),
    ])
}

async fn run(
    profile: LoadProfile,
    records: Vec<RawRecord>,
    store: &MemoryStore,
) -> loader::pipeline::RunReport {
    Pipeline::new(profile, MemorySource::new(records), store.clone())
        .run()
        .await
        .expect("run should succeed")
}

#[tokio::test(flavor = "multi_thread")]
async fn first_run_inserts_every_record() {
    init_test_tracing();

    let store = MemoryStore::new();
    let report = run(
        field_visits_profile(),
        vec![
            visit("44137762", "sur", "14/03/2025", -12.045_599, "Ana@Example.com"),
            visit("40882651", "norte", "14/03/2025", -11.990_001, "beto@example.com"),
        ],
        &store,
    )
    .await;

    assert_eq!(report.phase, RunPhase::Reported);
    assert_eq!(report.total_input, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.updated, 0);
    assert_eq!(report.unchanged, 0);
    assert_eq!(report.errors, 0);

    let rows = store.rows().await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.load_status == "new"));
    assert!(rows.iter().all(|row| row.updated_at.is_none()));

    // Normalization already happened by the time rows land.
    let first = &rows[0];
    assert_eq!(first.values["zone"], Value::Text("SUR".to_string()));
    assert_eq!(first.values["email"], Value::Text("ana@example.com".to_string()));
    assert_eq!(first.values["phone"], Value::Text("+51959673421".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn rerunning_the_same_extract_writes_nothing() {
    init_test_tracing();

    let store = MemoryStore::new();
    let extract = vec![
        visit("44137762", "SUR", "14/03/2025", -12.045_599, "ana@example.com"),
        visit("40882651", "NORTE", "14/03/2025", -11.990_001, "beto@example.com"),
    ];

    run(field_visits_profile(), extract.clone(), &store).await;
    let rows_after_first = store.rows().await;

    let report = run(field_visits_profile(), extract, &store).await;

    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.unchanged, 2);
    assert_eq!(store.rows().await, rows_after_first);
    assert!(store.audit_rows().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_fields_update_the_row_with_one_audit_entry_each() {
    init_test_tracing();

    let store = MemoryStore::new();
    run(
        field_visits_profile(),
        vec![visit("44137762", "SUR", "14/03/2025", -12.045_599, "ana@example.com")],
        &store,
    )
    .await;

    // Same key, two non-key fields changed.
    let report = run(
        field_visits_profile(),
        vec![visit("44137762", "SUR", "14/03/2025", -12.100_000, "ana.new@example.com")],
        &store,
    )
    .await;

    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(report.errors, 0);

    let rows = store.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].load_status, "updated");
    assert!(rows[0].updated_at.is_some());
    assert_eq!(rows[0].values["latitude"], Value::Numeric(-12.1));

    let audit = store.audit_rows().await;
    assert_eq!(audit.len(), 2);
    let fields: Vec<&str> = audit.iter().map(|row| row.entry.field.as_str()).collect();
    assert!(fields.contains(&"latitude"));
    assert!(fields.contains(&"email"));
    let email_change = audit
        .iter()
        .find(|row| row.entry.field == "email")
        .expect("email audit row");
    assert_eq!(email_change.entry.old_value.as_deref(), Some("ana@example.com"));
    assert_eq!(
        email_change.entry.new_value.as_deref(),
        Some("ana.new@example.com")
    );
    assert_eq!(email_change.actor, "loader");
}

#[tokio::test(flavor = "multi_thread")]
async fn records_missing_a_key_field_share_the_sentinel_bucket() {
    init_test_tracing();

    let store = MemoryStore::new();
    let report = run(
        field_visits_profile(),
        vec![
            visit("", "SUR", "14/03/2025", -12.0, "a@example.com"),
            visit("-", "SUR", "14/03/2025", -13.0, "b@example.com"),
        ],
        &store,
    )
    .await;

    // Both records collapse onto the sentinel key; the later one wins.
    assert_eq!(report.deduplicated, 1);
    assert_eq!(report.inserted, 1);

    let rows = store.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values["document"], Value::Text("UNKNOWN".to_string()));
    assert_eq!(rows[0].values["latitude"], Value::Numeric(-13.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn partitions_do_not_interfere() {
    init_test_tracing();

    let store = MemoryStore::new();
    run(
        field_visits_profile(),
        vec![visit("44137762", "SUR", "14/03/2025", -12.0, "ana@example.com")],
        &store,
    )
    .await;

    // Same key fields apart from the date: a distinct row in a new partition.
    let report = run(
        field_visits_profile(),
        vec![visit("44137762", "SUR", "15/03/2025", -12.0, "ana@example.com")],
        &store,
    )
    .await;

    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(store.rows().await.len(), 2);

    // Reloading one partition leaves the other untouched.
    let report = run(
        field_visits_profile(),
        vec![visit("44137762", "SUR", "15/03/2025", -12.5, "ana@example.com")],
        &store,
    )
    .await;

    assert_eq!(report.updated, 1);
    let rows = store.rows().await;
    let day_one = rows
        .iter()
        .find(|row| row.load_status == "new")
        .expect("first partition row");
    assert_eq!(day_one.values["latitude"], Value::Numeric(-12.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn one_failing_update_does_not_stop_the_run() {
    init_test_tracing();

    let store = MemoryStore::new();
    let first_extract: Vec<RawRecord> = (0..10)
        .map(|i| {
            visit(
                &format!("4413776{i}"),
                "SUR",
                "14/03/2025",
                -12.0,
                "ana@example.com",
            )
        })
        .collect();
    run(field_visits_profile(), first_extract, &store).await;

    let broken_key = store.rows().await[3].natural_key.clone();
    store.fail_updates_for(&broken_key).await;

    let second_extract: Vec<RawRecord> = (0..10)
        .map(|i| {
            visit(
                &format!("4413776{i}"),
                "SUR",
                "14/03/2025",
                -13.0,
                "ana@example.com",
            )
        })
        .collect();
    let report = run(field_visits_profile(), second_extract, &store).await;

    assert_eq!(report.phase, RunPhase::Reported);
    assert_eq!(report.updated, 9);
    assert_eq!(report.errors, 1);

    let rows = store.rows().await;
    assert_eq!(rows.iter().filter(|row| row.load_status == "updated").count(), 9);
    let broken = store
        .row_by_natural_key(&broken_key)
        .await
        .expect("broken row still present");
    assert_eq!(broken.values["latitude"], Value::Numeric(-12.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_source_aborts_before_any_write() {
    init_test_tracing();

    let store = MemoryStore::new();
    let mut pipeline = Pipeline::new(
        field_visits_profile(),
        MemorySource::new(Vec::new()),
        store.clone(),
    );
    let error = pipeline.run().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SourceEmpty);
    assert!(store.rows().await.is_empty());

    // The abort keeps the last completed phase next to the marker: the
    // source was read after the schema was ready, nothing further ran.
    assert_eq!(pipeline.phase(), RunPhase::Aborted);
    assert_eq!(pipeline.last_completed_phase(), RunPhase::SchemaReady);
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_audit_suppresses_audit_rows_but_not_updates() {
    init_test_tracing();

    let mut profile = field_visits_profile();
    profile.audit_enabled = false;

    let store = MemoryStore::new();
    run(
        profile.clone(),
        vec![visit("44137762", "SUR", "14/03/2025", -12.0, "ana@example.com")],
        &store,
    )
    .await;
    let report = run(
        profile,
        vec![visit("44137762", "SUR", "14/03/2025", -12.5, "ana@example.com")],
        &store,
    )
    .await;

    assert_eq!(report.updated, 1);
    assert!(store.audit_rows().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_profile_aborts_the_run() {
    init_test_tracing();

    let mut profile = field_visits_profile();
    profile.key_fields.clear();

    let store = MemoryStore::new();
    let mut pipeline = Pipeline::new(
        profile,
        MemorySource::new(vec![visit(
            "44137762",
            "SUR",
            "14/03/2025",
            -12.0,
            "ana@example.com",
        )]),
        store.clone(),
    );
    let error = pipeline.run().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ConfigError);
    assert!(store.rows().await.is_empty());

    // Validation fails before anything runs, so no phase completed.
    assert_eq!(pipeline.phase(), RunPhase::Aborted);
    assert_eq!(pipeline.last_completed_phase(), RunPhase::Init);
}
