//! Batched writes driven through the mock executor.

use rowbase::{DbConfig, MockExecutor, ModelDef, Orm, ResultSet, Row, Value, save_all};

fn orm(mock: &MockExecutor) -> Orm {
    Orm::builder()
        .database("main", DbConfig::new("app"))
        .database("audit", DbConfig::new("audit_db"))
        .executor(mock.clone())
        .model(ModelDef::new("main", "post").timestamps(true).dates(&["publishedAt"]))
        .model(ModelDef::new("main", "tag"))
        .model(ModelDef::new("audit", "event"))
        .build()
        .unwrap()
}

// ============================================
// save_all: grouping and key back-fill
// ============================================

#[tokio::test]
async fn save_all_groups_by_database_in_first_seen_order() {
    let mock = MockExecutor::starting_at(100);
    let orm = orm(&mock);
    let main = orm.db("main").unwrap();
    let audit = orm.db("audit").unwrap();

    let mut entities = vec![
        main.model("tag").unwrap().entity().with("name", "rust"),
        audit.model("event").unwrap().entity().with("kind", "signup"),
        main.model("tag").unwrap().entity().with("id", 9).with("name", "sql"),
        main.model("tag").unwrap().entity().with("name", "async"),
    ];
    save_all(&mut entities).await.unwrap();

    let batches = mock.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].database, "app");
    assert_eq!(
        batches[0].statements(),
        vec![
            "START TRANSACTION",
            "INSERT INTO `tag` SET `name` = 'rust'",
            "UPDATE `tag` SET `name` = 'sql' WHERE `id` = 9",
            "INSERT INTO `tag` SET `name` = 'async'",
            "COMMIT",
        ]
    );
    assert_eq!(batches[1].database, "audit_db");

    // Synthesized ids: 100 and 101 for the main inserts, 102 for audit.
    assert_eq!(entities[0].primary_key(), Some(&Value::UInt(100)));
    assert_eq!(entities[2].primary_key(), Some(&Value::Int(9)));
    assert_eq!(entities[3].primary_key(), Some(&Value::UInt(101)));
    assert_eq!(entities[1].primary_key(), Some(&Value::UInt(102)));
}

#[tokio::test]
async fn save_all_skips_empty_updates() {
    let mock = MockExecutor::new();
    let orm = orm(&mock);
    let tag = orm.db("main").unwrap().model("tag").unwrap();

    let mut entities = vec![tag.entity().with("id", 1), tag.entity().with("id", 2)];
    save_all(&mut entities).await.unwrap();
    assert!(mock.sql().is_empty());
}

#[tokio::test]
async fn failed_batch_leaves_keys_unset() {
    let mock = MockExecutor::new();
    mock.push_error(rowbase::OrmError::execution("Duplicate entry"));
    let orm = orm(&mock);
    let tag = orm.db("main").unwrap().model("tag").unwrap();

    let mut entities = vec![tag.entity().with("name", "a"), tag.entity().with("name", "a")];
    assert!(save_all(&mut entities).await.is_err());
    assert!(entities.iter().all(|e| e.primary_key().is_none()));
}

// ============================================
// Timestamps and dates
// ============================================

#[tokio::test]
async fn timestamps_on_insert_and_update() {
    let mock = MockExecutor::new();
    let post = orm(&mock).db("main").unwrap().model("post").unwrap();

    let mut created = post.entity().with("title", "a");
    created.save().await.unwrap();
    assert!(created.get("createdAt").is_some());
    assert!(created.get("updatedAt").is_some());

    let mut existing = post.entity().with("id", 3).with("title", "b");
    existing.save().await.unwrap();
    assert!(existing.get("createdAt").is_none());
    let sql = mock.last_sql().unwrap();
    assert!(sql.starts_with("UPDATE `post` SET `title` = 'b', `updatedAt` = '"), "{sql}");
    assert!(sql.ends_with("WHERE `id` = 3"), "{sql}");
}

#[tokio::test]
async fn bulk_insert_is_atomic_and_keeps_explicit_keys() {
    let mock = MockExecutor::starting_at(50);
    let post = orm(&mock).db("main").unwrap().model("post").unwrap();

    let saved = post
        .insert(vec![
            Row::new().with("title", "one").with("publishedAt", "12/31/2023"),
            Row::new().with("id", 7).with("title", "two").with("publishedAt", ""),
        ])
        .await
        .unwrap();

    assert_eq!(saved[0].primary_key(), Some(&Value::UInt(50)));
    assert_eq!(saved[0].get("publishedAt"), Some(&Value::from("2023-12-31 00:00:00")));
    assert_eq!(saved[1].primary_key(), Some(&Value::Int(7)));
    assert_eq!(saved[1].get("publishedAt"), Some(&Value::Null));

    let statements = mock.batches()[0].statements().len();
    assert_eq!(statements, 4);
    let sql = mock.last_sql().unwrap();
    assert!(sql.starts_with("START TRANSACTION; INSERT INTO `post` SET `title` = 'one'"));
    assert!(sql.contains("INSERT INTO `post` SET `id` = 7, `title` = 'two', `publishedAt` = NULL"));
}

#[tokio::test]
async fn insert_id_comes_from_the_driver() {
    let mock = MockExecutor::new();
    mock.push_response(vec![ResultSet::inserted(42)]);
    let tag = orm(&mock).db("main").unwrap().model("tag").unwrap();

    let mut entity = tag.entity().with("name", "x");
    entity.save().await.unwrap();
    assert_eq!(entity.primary_key(), Some(&Value::UInt(42)));
}
