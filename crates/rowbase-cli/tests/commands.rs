//! End-to-end command runs against the mock executor.

use rowbase::{
    Db, DbConfig, Migration, Mode, MockExecutor, Orm, OrmError, OrmResult, Schema, async_trait,
};
use rowbase_cli::{Project, Seed, run, run_with_exit_code};
use std::sync::{Arc, Mutex};

struct CreatePost;

#[async_trait]
impl Migration for CreatePost {
    fn name(&self) -> &str {
        "2024_01_01_120000_createPost"
    }

    async fn up(&self, schema: &Schema) -> OrmResult<()> {
        schema
            .create("post", |t| {
                t.id("id");
                t.string("title");
            })
            .await
    }

    async fn down(&self, schema: &Schema) -> OrmResult<()> {
        schema.drop_if_exists("post").await
    }
}

struct CreateTag;

#[async_trait]
impl Migration for CreateTag {
    fn name(&self) -> &str {
        "2024_02_01_120000_createTag"
    }

    async fn up(&self, schema: &Schema) -> OrmResult<()> {
        schema
            .create("tag", |t| {
                t.id("id");
            })
            .await
    }

    async fn down(&self, schema: &Schema) -> OrmResult<()> {
        schema.drop_if_exists("tag").await
    }
}

struct UserSeed {
    calls: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl Seed for UserSeed {
    fn name(&self) -> &str {
        "users"
    }

    async fn exec(&self, db: &Db, count: usize) -> OrmResult<()> {
        self.calls.lock().unwrap().push(count);
        for i in 0..count {
            db.insert(
                "INSERT INTO ::table (::column) VALUES (:name)",
                rowbase::params! { "table" => "user", "column" => "name", "name" => format!("user{i}") },
            )
            .await?;
        }
        Ok(())
    }
}

fn argv(tokens: &[&str]) -> Vec<String> {
    std::iter::once("app")
        .chain(tokens.iter().copied())
        .map(str::to_string)
        .collect()
}

fn project(mock: &MockExecutor, mode: Mode, config: DbConfig) -> Project {
    let orm = Orm::builder()
        .mode(mode)
        .database("main", config)
        .executor(mock.clone())
        .build()
        .unwrap();
    Project::new(orm).migration("main", CreatePost)
}

fn guard_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<OrmError>().is_some_and(OrmError::is_guard)
}

#[tokio::test]
async fn remote_host_is_refused_without_sql() {
    let mock = MockExecutor::new();
    let project = project(&mock, Mode::Development, DbConfig::new("app").host("db.internal"));

    let err = run(argv(&["migrate"]), &project).await.unwrap_err();
    assert!(guard_error(&err));
    assert_eq!(err.to_string(), "Canceled migration (not on localhost)");
    assert!(mock.sql().is_empty());
}

#[tokio::test]
async fn force_migrates_remote_host() {
    let mock = MockExecutor::new();
    let project = project(&mock, Mode::Development, DbConfig::new("app").host("db.internal"));

    run(argv(&["migrate", "--force"]), &project).await.unwrap();
    let sql = mock.sql().join("\n");
    assert!(sql.contains("CREATE TABLE `post`"), "{sql}");
    assert!(sql.contains("'2024_01_01_120000_createPost'"), "{sql}");
}

#[tokio::test]
async fn production_prompt_declined() {
    let mock = MockExecutor::new();
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&prompts);
    let project = project(&mock, Mode::Production, DbConfig::new("app")).confirm_with(move |msg| {
        seen.lock().unwrap().push(msg.to_string());
        false
    });

    let err = run(argv(&["migrate", "up"]), &project).await.unwrap_err();
    assert!(guard_error(&err));
    assert_eq!(err.to_string(), "Canceled migration (app in production)");
    assert_eq!(prompts.lock().unwrap().len(), 1);
    assert!(mock.sql().is_empty());
    assert_eq!(run_with_exit_code(argv(&["migrate", "up"]), &project).await, 1);
}

#[tokio::test]
async fn fresh_honors_steps() {
    let mock = MockExecutor::new();
    let project = project(&mock, Mode::Development, DbConfig::new("app")).migration("main", CreateTag);

    run(argv(&["migrate", "fresh", "1"]), &project).await.unwrap();
    let sql = mock.sql().join("\n");
    assert!(sql.contains("CREATE TABLE `post`"), "{sql}");
    assert!(sql.contains("'2024_01_01_120000_createPost'"), "{sql}");
    assert!(!sql.contains("CREATE TABLE `tag`"), "{sql}");
    assert!(!sql.contains("createTag"), "{sql}");
}

#[tokio::test]
async fn status_never_prompts_or_writes() {
    let mock = MockExecutor::new();
    let project = project(&mock, Mode::Production, DbConfig::new("app").protected(true))
        .confirm_with(|_| panic!("status must not prompt"));

    run(argv(&["migrate", "status"]), &project).await.unwrap();
    for sql in mock.sql() {
        assert!(!sql.contains("CREATE TABLE"), "{sql}");
    }
}

#[tokio::test]
async fn seed_count_reaches_the_seed() {
    let mock = MockExecutor::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let project = project(&mock, Mode::Development, DbConfig::new("app")).seed(
        "main",
        UserSeed {
            calls: Arc::clone(&calls),
        },
    );

    assert_eq!(run_with_exit_code(argv(&["seed", "3"]), &project).await, 0);
    assert_eq!(*calls.lock().unwrap(), vec![3]);
    assert_eq!(mock.batches().len(), 3);

    run(argv(&["seed", "users"]), &project).await.unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![3, 1]);
}

#[tokio::test]
async fn unknown_seed_fails() {
    let mock = MockExecutor::new();
    let project = project(&mock, Mode::Development, DbConfig::new("app"));

    let err = run(argv(&["seed", "missing"]), &project).await.unwrap_err();
    assert_eq!(err.to_string(), "Seed \"missing\" not found");

    // No seeds registered at all is not an error.
    run(argv(&["seed"]), &project).await.unwrap();
}
