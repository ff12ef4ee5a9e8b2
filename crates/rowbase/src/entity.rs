//! Models bound to a database handle, and the entities they produce.
//!
//! An [`Entity`] is one row of a model's table held as an ordered column map.
//! Saving an entity without a primary key inserts it and back-fills the
//! generated key; saving one with a key updates it in place.

use crate::date::{normalize_value, now_string};
use crate::db::{Db, Output, Statement};
use crate::error::{OrmError, OrmResult};
use crate::model::ModelDef;
use crate::params;
use crate::query::{PivotSpec, Query};
use crate::relation::RelationPath;
use crate::value::{Row, Value};
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A model definition bound to a database handle.
#[derive(Clone)]
pub struct Model {
    db: Db,
    def: Arc<ModelDef>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("core", &self.db.core())
            .field("name", &self.def.name())
            .field("table", &self.def.table_name())
            .finish()
    }
}

impl Model {
    pub(crate) fn new(db: Db, def: Arc<ModelDef>) -> Self {
        Self { db, def }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn def(&self) -> &ModelDef {
        &self.def
    }

    pub fn table(&self) -> &str {
        self.def.table_name()
    }

    pub fn primary_key(&self) -> &str {
        self.def.primary_key_column()
    }

    /// Fresh query over this model's table.
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    /// An empty, unsaved entity.
    pub fn entity(&self) -> Entity {
        self.entity_from(Row::new())
    }

    /// An entity holding `row`'s columns.
    pub fn entity_from(&self, row: Row) -> Entity {
        Entity {
            model: self.clone(),
            attributes: row.into_columns(),
            transient: IndexMap::new(),
        }
    }

    pub async fn find(&self, id: impl Into<Value>) -> OrmResult<Option<Entity>> {
        self.query().find(id).await
    }

    pub async fn first(&self) -> OrmResult<Option<Entity>> {
        self.query().first().await
    }

    pub async fn get(&self) -> OrmResult<Vec<Entity>> {
        self.query().get().await
    }

    pub async fn count(&self) -> OrmResult<i64> {
        self.query().count().await
    }

    pub fn where_eq(&self, key: &str, value: impl Into<Value>) -> Query {
        self.query().where_eq(key, value)
    }

    pub fn where_op(&self, key: &str, op: &str, value: impl Into<Value>) -> Query {
        self.query().where_op(key, op, value)
    }

    pub fn where_in<V: Into<Value>>(&self, key: &str, values: impl IntoIterator<Item = V>) -> Query {
        self.query().where_in(key, values)
    }

    /// `whereTitle` style filter: the text after `where` names the column,
    /// with only its first letter lowercased.
    ///
    /// ```ignore
    /// let drafts = post.where_by("whereStatus", "draft")?.get().await?;
    /// ```
    pub fn where_by(&self, property: &str, value: impl Into<Value>) -> OrmResult<Query> {
        let column = property
            .strip_prefix("where")
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                OrmError::configuration(format!(
                    "'{property}' is not a filter on model '{}'",
                    self.def.name()
                ))
            })?;
        Ok(self.where_eq(&lower_first(column), value))
    }

    /// Delete the row whose primary key is `id`.
    pub async fn delete(&self, id: impl Into<Value>) -> OrmResult<u64> {
        self.db
            .delete(
                "DELETE FROM ::table WHERE ::pk = :id",
                params! { "table" => self.table(), "pk" => self.primary_key(), "id" => id },
            )
            .await
    }

    /// Delete every row of the table.
    pub async fn delete_all(&self) -> OrmResult<u64> {
        self.db
            .delete(
                "DELETE FROM ::table WHERE 1=1",
                params! { "table" => self.table() },
            )
            .await
    }

    /// Insert every row in one atomic batch.
    ///
    /// Returns the saved entities with generated keys filled in. Explicit
    /// primary key values are inserted as given.
    pub async fn insert(&self, rows: Vec<Row>) -> OrmResult<Vec<Entity>> {
        let mut entities = Vec::with_capacity(rows.len());
        let mut statements = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entity = self.entity_from(row);
            entity.prepare(true)?;
            statements.push(entity.insert_statement());
            entities.push(entity);
        }

        let outputs = self.db.execute_atomic(statements).await?;
        for (entity, output) in entities.iter_mut().zip(outputs) {
            entity.back_fill(&output);
        }
        Ok(entities)
    }
}

/// One row of a model's table.
#[derive(Clone)]
pub struct Entity {
    model: Model,
    attributes: IndexMap<String, Value>,
    transient: IndexMap<String, Value>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("table", &self.model.table())
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl Entity {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(column.to_string(), value.into());
        self
    }

    /// Builder-style [`Entity::set`].
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.attributes.shift_remove(column)
    }

    /// Copy columns from `values`, restricted to `columns` when given.
    pub fn assign(&mut self, values: &Row, columns: Option<&[&str]>) -> &mut Self {
        for (column, value) in values.iter() {
            if columns.is_none_or(|allowed| allowed.contains(&column.as_str())) {
                self.attributes.insert(column.clone(), value.clone());
            }
        }
        self
    }

    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    /// State carried alongside the entity that is never persisted.
    pub fn transient(&self, key: &str) -> Option<&Value> {
        self.transient.get(key)
    }

    pub fn set_transient(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.transient.insert(key.to_string(), value.into());
        self
    }

    /// Primary key value; `None` when absent or NULL.
    pub fn primary_key(&self) -> Option<&Value> {
        self.get(self.model.primary_key()).filter(|v| !v.is_null())
    }

    pub fn is_new(&self) -> bool {
        self.primary_key().is_none()
    }

    /// Query for a declared relationship, pinned to this entity.
    ///
    /// Singular relationships come back in first-row mode.
    pub fn relation(&self, name: &str) -> OrmResult<Query> {
        let rel = self.model.def().relation(name).ok_or_else(|| {
            OrmError::configuration(format!(
                "model '{}' has no relationship '{name}'",
                self.model.def().name()
            ))
        })?;
        let key = self
            .get(rel.owner_column())
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                OrmError::validation(format!(
                    "relationship '{name}' needs a value for '{}'",
                    rel.owner_column()
                ))
            })?;

        let db = self.model.db();
        let query = match &rel.path {
            RelationPath::Direct {
                foreign_column,
                target_table,
                ..
            } => db.table(target_table).where_eq(foreign_column, key),
            RelationPath::Pivot {
                owner_table,
                owner_column,
                owner_fk,
                pivot_table,
                target_fk,
                target_column,
                target_table,
            } => db.table(target_table).set_pivot(
                PivotSpec::new(owner_table.as_str(), key)
                    .owner_column(owner_column.as_str())
                    .pivot_table(pivot_table.as_str())
                    .owner_fk(owner_fk.as_str())
                    .target_fk(target_fk.as_str())
                    .target_column(target_column.as_str()),
            ),
        };
        Ok(if rel.single { query.first_only() } else { query })
    }

    /// Insert or update, depending on whether the primary key is set.
    pub async fn save(&mut self) -> OrmResult<&mut Self> {
        let Some(statement) = self.write_statement()? else {
            return Ok(self);
        };
        let output = self
            .model
            .db()
            .execute(vec![statement])
            .await?
            .pop()
            .ok_or_else(|| OrmError::execution("save produced no result"))?;
        self.back_fill(&output);
        Ok(self)
    }

    /// Delete this entity's row.
    pub async fn delete(&self) -> OrmResult<u64> {
        let id = self.primary_key().cloned().ok_or_else(|| {
            OrmError::validation(format!(
                "cannot delete a '{}' row without a primary key",
                self.model.table()
            ))
        })?;
        self.model.delete(id).await
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Stamp timestamps and normalize date columns in place.
    fn prepare(&mut self, creating: bool) -> OrmResult<()> {
        let def = Arc::clone(&self.model.def);
        if let Some(stamps) = def.timestamp_policy() {
            let now = now_string();
            if creating {
                self.set(&stamps.created_at, now.as_str());
            }
            self.set(&stamps.updated_at, now);
        }
        for column in def.date_columns() {
            if let Some(value) = self.attributes.get_mut(column) {
                *value = normalize_value(value)?;
            }
        }
        Ok(())
    }

    /// `None` when an update has nothing to set.
    fn write_statement(&mut self) -> OrmResult<Option<Statement>> {
        let creating = self.is_new();
        self.prepare(creating)?;
        Ok(if creating {
            Some(self.insert_statement())
        } else {
            self.update_statement()
        })
    }

    fn insert_statement(&self) -> Statement {
        let pk = self.model.primary_key();
        let mut params = params! { "table" => self.model.table() };
        let mut sets = Vec::new();
        for (column, value) in &self.attributes {
            if column == pk && value.is_null() {
                continue;
            }
            let i = sets.len();
            sets.push(format!("::c{i} = :v{i}"));
            params.insert(format!("c{i}"), column.as_str());
            params.insert(format!("v{i}"), value.clone());
        }

        let template = if sets.is_empty() {
            "INSERT INTO ::table () VALUES ()".to_string()
        } else {
            format!("INSERT INTO ::table SET {}", sets.join(", "))
        };
        Statement::insert(template, params)
    }

    fn update_statement(&self) -> Option<Statement> {
        let pk = self.model.primary_key();
        let id = self.primary_key()?.clone();
        let mut params = params! { "table" => self.model.table(), "pk" => pk, "pk_value" => id };
        let mut sets = Vec::new();
        for (column, value) in &self.attributes {
            if column == pk {
                continue;
            }
            let i = sets.len();
            sets.push(format!("::c{i} = :v{i}"));
            params.insert(format!("c{i}"), column.as_str());
            params.insert(format!("v{i}"), value.clone());
        }
        if sets.is_empty() {
            return None;
        }
        Some(Statement::update(
            format!("UPDATE ::table SET {} WHERE ::pk = :pk_value", sets.join(", ")),
            params,
        ))
    }

    fn back_fill(&mut self, output: &Output) {
        if let (Output::InsertId(Some(id)), true) = (output, self.is_new()) {
            let pk = self.model.primary_key().to_string();
            self.set(&pk, Value::UInt(*id));
        }
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(&self.attributes)
    }
}

/// Save entities of possibly different databases.
///
/// Entities are grouped by database in first-seen order and each group runs
/// as one atomic batch. Generated keys are back-filled positionally.
pub async fn save_all(entities: &mut [Entity]) -> OrmResult<()> {
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (i, entity) in entities.iter().enumerate() {
        groups
            .entry(entity.model.db().core().to_string())
            .or_default()
            .push(i);
    }

    for indices in groups.into_values() {
        let mut written = Vec::with_capacity(indices.len());
        let mut statements = Vec::with_capacity(indices.len());
        for i in indices {
            if let Some(statement) = entities[i].write_statement()? {
                written.push(i);
                statements.push(statement);
            }
        }
        let Some(&first) = written.first() else {
            continue;
        };
        let db = entities[first].model.db().clone();
        let outputs = db.execute_atomic(statements).await?;
        for (i, output) in written.into_iter().zip(outputs) {
            entities[i].back_fill(&output);
        }
    }
    Ok(())
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
