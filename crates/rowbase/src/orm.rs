//! The application-wide handle: databases, executor and model registry.

use crate::config::{Config, DbConfig, Mode};
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, MySqlExecutor};
use crate::model::ModelDef;
use crate::registry::Registry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

struct OrmInner {
    databases: BTreeMap<String, Arc<DbConfig>>,
    mode: Mode,
    maintenance_mode: bool,
    executor: Arc<dyn Executor>,
    registry: Registry,
}

/// Cheap-to-clone handle built once at startup.
///
/// ```ignore
/// let orm = Orm::builder()
///     .config(Config::load("rowbase.toml")?)
///     .model(ModelDef::new("main", "post").timestamps(true))
///     .build()?;
/// let posts = orm.db("main")?.model("post")?.get().await?;
/// ```
#[derive(Clone)]
pub struct Orm {
    inner: Arc<OrmInner>,
}

impl fmt::Debug for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orm")
            .field("databases", &self.inner.databases.keys().collect::<Vec<_>>())
            .field("mode", &self.inner.mode)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl Orm {
    pub fn builder() -> OrmBuilder {
        OrmBuilder::default()
    }

    /// Handle to a configured database.
    pub fn db(&self, core: &str) -> OrmResult<Db> {
        let config = self
            .inner
            .databases
            .get(core)
            .ok_or_else(|| OrmError::configuration(format!("unknown database '{core}'")))?;
        Ok(Db::new(self.clone(), core, Arc::clone(config)))
    }

    /// Configured database names, sorted.
    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.inner.databases.keys().map(String::as_str)
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn executor(&self) -> &dyn Executor {
        self.inner.executor.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn is_production(&self) -> bool {
        self.inner.mode == Mode::Production
    }

    pub fn maintenance_mode(&self) -> bool {
        self.inner.maintenance_mode
    }
}

#[derive(Default)]
pub struct OrmBuilder {
    databases: BTreeMap<String, DbConfig>,
    mode: Mode,
    maintenance_mode: bool,
    executor: Option<Arc<dyn Executor>>,
    models: Vec<ModelDef>,
}

impl OrmBuilder {
    /// Take mode, maintenance flag and every database from a loaded config.
    pub fn config(mut self, config: Config) -> Self {
        self.mode = config.mode;
        self.maintenance_mode = config.maintenance_mode;
        self.databases.extend(config.databases);
        self
    }

    pub fn database(mut self, core: impl Into<String>, config: DbConfig) -> Self {
        self.databases.insert(core.into(), config);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn maintenance_mode(mut self, enabled: bool) -> Self {
        self.maintenance_mode = enabled;
        self
    }

    /// Replace the default [`MySqlExecutor`].
    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn model(mut self, def: ModelDef) -> Self {
        self.models.push(def);
        self
    }

    pub fn models(mut self, defs: impl IntoIterator<Item = ModelDef>) -> Self {
        self.models.extend(defs);
        self
    }

    /// Parse relationships and build the registry.
    ///
    /// Fails on malformed descriptors, duplicate registrations and models
    /// that reference an unconfigured database.
    pub fn build(self) -> OrmResult<Orm> {
        let mut registry = Registry::default();
        for def in self.models {
            registry.register(def)?;
        }
        if let Some(core) = registry.cores().find(|c| !self.databases.contains_key(*c)) {
            return Err(OrmError::configuration(format!(
                "models registered for unknown database '{core}'"
            )));
        }

        tracing::debug!(
            target: "rowbase.sql",
            databases = self.databases.len(),
            "orm initialized"
        );

        Ok(Orm {
            inner: Arc::new(OrmInner {
                databases: self
                    .databases
                    .into_iter()
                    .map(|(core, config)| (core, Arc::new(config)))
                    .collect(),
                mode: self.mode,
                maintenance_mode: self.maintenance_mode,
                executor: self
                    .executor
                    .unwrap_or_else(|| Arc::new(MySqlExecutor)),
                registry,
            }),
        })
    }
}
