//! Lookup of model definitions by database and table or model name.

use crate::error::{OrmError, OrmResult};
use crate::model::ModelDef;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct CoreModels {
    by_table: BTreeMap<String, Arc<ModelDef>>,
    by_name: BTreeMap<String, Arc<ModelDef>>,
}

/// Immutable once the owning [`Orm`](crate::Orm) is built.
#[derive(Debug, Default)]
pub struct Registry {
    cores: BTreeMap<String, CoreModels>,
}

impl Registry {
    pub(crate) fn register(&mut self, def: ModelDef) -> OrmResult<()> {
        let def = Arc::new(def.finalize()?);
        let models = self.cores.entry(def.core().to_string()).or_default();

        if models.by_table.contains_key(def.table_name()) {
            return Err(OrmError::configuration(format!(
                "table '{}' of '{}' is already bound to a model",
                def.table_name(),
                def.core()
            )));
        }
        if models.by_name.contains_key(def.name()) {
            return Err(OrmError::configuration(format!(
                "model '{}' is already registered for '{}'",
                def.name(),
                def.core()
            )));
        }

        models
            .by_table
            .insert(def.table_name().to_string(), Arc::clone(&def));
        models.by_name.insert(def.name().to_string(), def);
        Ok(())
    }

    pub fn by_table(&self, core: &str, table: &str) -> Option<Arc<ModelDef>> {
        self.cores.get(core)?.by_table.get(table).cloned()
    }

    pub fn by_name(&self, core: &str, name: &str) -> Option<Arc<ModelDef>> {
        self.cores.get(core)?.by_name.get(name).cloned()
    }

    /// The registered definition for `table`, or a fresh generic one.
    pub fn resolve(&self, core: &str, table: &str) -> Arc<ModelDef> {
        self.by_table(core, table)
            .unwrap_or_else(|| Arc::new(ModelDef::generic(core, table)))
    }

    /// Registered definitions of one database, ordered by model name.
    pub fn models(&self, core: &str) -> Vec<Arc<ModelDef>> {
        self.cores
            .get(core)
            .map(|m| m.by_name.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn cores(&self) -> impl Iterator<Item = &str> {
        self.cores.keys().map(String::as_str)
    }
}
