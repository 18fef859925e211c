/// Integration tests for database module
///
/// Tests the complete database lifecycle including:
/// - Database creation and initialization
/// - WAL mode configuration
/// - Schema creation via migrations
/// - Entity cache, alias table, stored profiles and run history
use delve_engine::db::{CachedRecord, Database, ProfileRecord, RunStatus, StepKind};
use serde_json::json;
use tempfile::TempDir;

async fn open() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("delve.db")).await.unwrap();
    (temp_dir, db)
}

fn acme_record() -> CachedRecord {
    CachedRecord {
        uuid: "acme-uuid".to_string(),
        name: "Acme Corp".to_string(),
        entity_type: "organization".to_string(),
        document: json!({
            "name": "Acme Corp",
            "revenue_range": "$10M to $50M",
            "num_employees_enum": "101-250"
        }),
        fetched_at: 1_700_000_000,
    }
}

#[tokio::test]
async fn test_database_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("delve.db");

    let db = Database::new(&db_path).await.unwrap();

    // Parent directories are created
    assert!(db_path.exists());

    // WAL mode leaves a -wal file next to the database
    let wal_path = temp_dir.path().join("nested").join("delve.db-wal");
    assert!(wal_path.exists());

    let result = sqlx::query("SELECT COUNT(*) as count FROM runs")
        .fetch_one(db.pool())
        .await;
    assert!(result.is_ok());

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_database_schema_complete() {
    let (_dir, db) = open().await;

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .unwrap();

    for table in ["entity_cache", "entity_aliases", "profiles", "runs", "run_steps"] {
        assert!(tables.contains(&table.to_string()), "{} table missing", table);
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("delve.db");

    let db = Database::new(&db_path).await.unwrap();
    db.entity_cache().put(&acme_record()).await.unwrap();
    db.close().await.unwrap();

    // Reopening re-runs the schema without touching existing rows
    let db = Database::new(&db_path).await.unwrap();
    assert!(db.entity_cache().exists("acme-uuid").await.unwrap());
}

#[tokio::test]
async fn test_entity_cache_put_get() {
    let (_dir, db) = open().await;
    let cache = db.entity_cache();

    assert!(cache.get("acme-uuid").await.unwrap().is_none());
    assert!(!cache.exists("acme-uuid").await.unwrap());

    cache.put(&acme_record()).await.unwrap();

    let fetched = cache.get("acme-uuid").await.unwrap().unwrap();
    assert_eq!(fetched, acme_record());
    assert!(cache.exists("acme-uuid").await.unwrap());
}

#[tokio::test]
async fn test_entity_cache_put_replaces() {
    let (_dir, db) = open().await;
    let cache = db.entity_cache();

    cache.put(&acme_record()).await.unwrap();
    let mut updated = acme_record();
    updated.document = json!({"name": "Acme Corp", "revenue_range": "$50M to $100M"});
    cache.put(&updated).await.unwrap();

    let fetched = cache.get("acme-uuid").await.unwrap().unwrap();
    assert_eq!(fetched.document["revenue_range"], "$50M to $100M");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entity_cache")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_alias_round_trip() {
    let (_dir, db) = open().await;
    let cache = db.entity_cache();

    assert!(cache.resolve_alias("acme").await.unwrap().is_none());

    cache.record_alias("acme", "acme-uuid").await.unwrap();
    assert_eq!(
        cache.resolve_alias("acme").await.unwrap().as_deref(),
        Some("acme-uuid")
    );

    // Re-recording points the alias at the new UUID
    cache.record_alias("acme", "acme-uuid-2").await.unwrap();
    assert_eq!(
        cache.resolve_alias("acme").await.unwrap().as_deref(),
        Some("acme-uuid-2")
    );
}

#[tokio::test]
async fn test_profile_import_and_find() {
    let (_dir, db) = open().await;
    let profiles = db.profiles();

    let records = vec![
        ProfileRecord {
            profile_url: "https://www.linkedin.com/in/jdoe".to_string(),
            name: Some("Jane Doe".to_string()),
            skills: Some(json!(["Rust", "SQL"])),
            ..Default::default()
        },
        ProfileRecord {
            profile_url: "   ".to_string(),
            name: Some("No URL".to_string()),
            ..Default::default()
        },
    ];

    let stored = profiles.import(&records).await.unwrap();
    assert_eq!(stored, 1);

    let found = profiles
        .find_by_url("https://www.linkedin.com/in/jdoe")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, records[0]);

    // Exact match only
    assert!(profiles
        .find_by_url("https://www.linkedin.com/in/jdoe/")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_profile_upsert_replaces() {
    let (_dir, db) = open().await;
    let profiles = db.profiles();

    let mut record = ProfileRecord {
        profile_url: "https://www.linkedin.com/in/jdoe".to_string(),
        title: Some("Engineer".to_string()),
        ..Default::default()
    };
    profiles.upsert(&record).await.unwrap();

    record.title = Some("Staff Engineer".to_string());
    profiles.upsert(&record).await.unwrap();

    let found = profiles.find_by_url(&record.profile_url).await.unwrap().unwrap();
    assert_eq!(found.title.as_deref(), Some("Staff Engineer"));
}

#[tokio::test]
async fn test_run_lifecycle() {
    let (_dir, db) = open().await;
    let runs = db.runs();

    let run = runs.create_run("run-1", "Who founded Acme Corp?").await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.completed_at.is_none());

    runs.add_step("run-1", 0, StepKind::Decomposition, None, "1. Find the founders")
        .await
        .unwrap();
    runs.add_step(
        "run-1",
        1,
        StepKind::Dispatch,
        Some("Find the founders"),
        "Acme Corp was founded by Wile E. Coyote.",
    )
    .await
    .unwrap();
    runs.add_step("run-1", 2, StepKind::Synthesis, None, "Wile E. Coyote.")
        .await
        .unwrap();

    runs.complete_run("run-1", "Wile E. Coyote.", Some("ollama"), 1234)
        .await
        .unwrap();

    let stored = runs.get_run("run-1").await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.answer.as_deref(), Some("Wile E. Coyote."));
    assert_eq!(stored.provider_used.as_deref(), Some("ollama"));
    assert_eq!(stored.duration_ms, Some(1234));
    assert!(stored.completed_at.is_some());

    let steps = runs.get_steps("run-1").await.unwrap();
    let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![StepKind::Decomposition, StepKind::Dispatch, StepKind::Synthesis]
    );
    assert_eq!(steps[1].sub_task.as_deref(), Some("Find the founders"));
}

#[tokio::test]
async fn test_failed_run() {
    let (_dir, db) = open().await;
    let runs = db.runs();

    runs.create_run("run-2", "query").await.unwrap();
    runs.fail_run("run-2", "All LLM providers failed", 10).await.unwrap();

    let stored = runs.get_run("run-2").await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("All LLM providers failed"));
    assert!(stored.answer.is_none());
}

#[tokio::test]
async fn test_recent_runs_newest_first() {
    let (_dir, db) = open().await;
    let runs = db.runs();

    for i in 0..5 {
        runs.create_run(&format!("run-{}", i), &format!("query {}", i))
            .await
            .unwrap();
    }

    let recent = runs.recent_runs(3).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["run-4", "run-3", "run-2"]);

    assert!(runs.get_run("missing").await.unwrap().is_none());
}
