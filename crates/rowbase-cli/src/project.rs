use async_trait::async_trait;
use rowbase::{Db, Migration, Orm, OrmResult};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Sample data generator run by `seed`.
#[async_trait]
pub trait Seed: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Insert `count` items.
    async fn exec(&self, db: &Db, count: usize) -> OrmResult<()>;
}

/// Answers a yes/no prompt.
pub type Confirm = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Everything the commands need from the host application.
///
/// ```ignore
/// let project = Project::new(orm)
///     .migrations("main", migrations::all())
///     .seed("main", UserSeed);
/// std::process::exit(rowbase_cli::run_with_exit_code(std::env::args().collect(), &project).await);
/// ```
#[derive(Clone)]
pub struct Project {
    orm: Orm,
    default_database: Option<String>,
    migrations: BTreeMap<String, Vec<Arc<dyn Migration>>>,
    seeds: BTreeMap<String, Vec<Arc<dyn Seed>>>,
    confirm: Confirm,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("orm", &self.orm)
            .field("default_database", &self.default_database)
            .field("migrations", &self.migrations.keys().collect::<Vec<_>>())
            .field("seeds", &self.seeds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Project {
    pub fn new(orm: Orm) -> Self {
        Self {
            orm,
            default_database: None,
            migrations: BTreeMap::new(),
            seeds: BTreeMap::new(),
            confirm: Arc::new(prompt_stdin),
        }
    }

    /// Database used when `--database` is not given.
    pub fn default_database(mut self, core: impl Into<String>) -> Self {
        self.default_database = Some(core.into());
        self
    }

    pub fn migration(mut self, core: &str, migration: impl Migration + 'static) -> Self {
        self.migrations
            .entry(core.to_string())
            .or_default()
            .push(Arc::new(migration));
        self
    }

    pub fn migrations(
        mut self,
        core: &str,
        migrations: impl IntoIterator<Item = Arc<dyn Migration>>,
    ) -> Self {
        self.migrations
            .entry(core.to_string())
            .or_default()
            .extend(migrations);
        self
    }

    /// Seeds run in registration order.
    pub fn seed(mut self, core: &str, seed: impl Seed + 'static) -> Self {
        self.seeds
            .entry(core.to_string())
            .or_default()
            .push(Arc::new(seed));
        self
    }

    /// Replace the interactive stdin prompt.
    pub fn confirm_with(mut self, confirm: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.confirm = Arc::new(confirm);
        self
    }

    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    /// `requested`, else the configured default, else the first database.
    pub fn resolve_database(&self, requested: Option<&str>) -> anyhow::Result<String> {
        if let Some(core) = requested.or(self.default_database.as_deref()) {
            return Ok(core.to_string());
        }
        self.orm
            .databases()
            .next()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("no databases configured"))
    }

    pub fn migrations_for(&self, core: &str) -> Vec<Arc<dyn Migration>> {
        self.migrations.get(core).cloned().unwrap_or_default()
    }

    pub fn seeds_for(&self, core: &str) -> &[Arc<dyn Seed>] {
        self.seeds.get(core).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) async fn confirm(&self, message: &str) -> bool {
        let confirm = Arc::clone(&self.confirm);
        let message = message.to_string();
        tokio::task::spawn_blocking(move || confirm(&message))
            .await
            .unwrap_or(false)
    }
}

fn prompt_stdin(message: &str) -> bool {
    print!("{message} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
