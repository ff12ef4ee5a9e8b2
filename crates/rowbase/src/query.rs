//! Fluent query builder compiled to a single `SELECT`, `SELECT count(*)` or
//! `DELETE` statement.
//!
//! Builders are owned values: every method consumes `self` and returns the
//! updated builder. Invalid input (an unknown operator, `NULL` compared with
//! `<`) is recorded and reported when the query is compiled.
//!
//! ```ignore
//! let posts = db
//!     .table("post")
//!     .where_eq("published", true)
//!     .where_op("views", ">", 100)
//!     .get()
//!     .await?;
//! ```

use crate::db::{Output, Statement};
use crate::entity::{Entity, Model};
use crate::error::{OrmError, OrmResult};
use crate::escape::{Params, escape, escape_id};
use crate::params;
use crate::value::{Row, Value};
use heck::ToLowerCamelCase;

/// Junction table name for two tables: sorted, joined with `_`, lowerCamelCased.
///
/// The order of the arguments does not matter.
pub fn pivot_table_name(a: &str, b: &str) -> String {
    let mut names = [a, b];
    names.sort_unstable();
    names.join("_").to_lower_camel_case()
}

/// Default foreign key column referencing `table`.
pub fn foreign_key(table: &str) -> String {
    format!("{table}Id")
}

/// What a compiled query does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Many,
    /// `LIMIT 1`, at most one entity.
    First,
    Count,
    Delete,
}

/// Pivot join request; unset names are derived from the table names.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotSpec {
    pub owner_table: String,
    pub owner_value: Value,
    pub owner_column: String,
    pub pivot_table: Option<String>,
    pub owner_fk: Option<String>,
    pub target_fk: Option<String>,
    pub target_column: String,
}

impl PivotSpec {
    /// Pivot from the owner row whose `id` is `owner_value`.
    pub fn new(owner_table: impl Into<String>, owner_value: impl Into<Value>) -> Self {
        Self {
            owner_table: owner_table.into(),
            owner_value: owner_value.into(),
            owner_column: "id".to_string(),
            pivot_table: None,
            owner_fk: None,
            target_fk: None,
            target_column: "id".to_string(),
        }
    }

    pub fn owner_column(mut self, column: impl Into<String>) -> Self {
        self.owner_column = column.into();
        self
    }

    pub fn pivot_table(mut self, table: impl Into<String>) -> Self {
        self.pivot_table = Some(table.into());
        self
    }

    /// Junction column referencing the owner.
    pub fn owner_fk(mut self, column: impl Into<String>) -> Self {
        self.owner_fk = Some(column.into());
        self
    }

    /// Junction column referencing the queried table.
    pub fn target_fk(mut self, column: impl Into<String>) -> Self {
        self.target_fk = Some(column.into());
        self
    }

    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    fn resolve(self, target_table: &str) -> Pivot {
        Pivot {
            pivot_table: self
                .pivot_table
                .unwrap_or_else(|| pivot_table_name(&self.owner_table, target_table)),
            owner_fk: self.owner_fk.unwrap_or_else(|| foreign_key(&self.owner_table)),
            target_fk: self.target_fk.unwrap_or_else(|| foreign_key(target_table)),
            owner_table: self.owner_table,
            owner_value: self.owner_value,
            owner_column: self.owner_column,
            target_table: target_table.to_string(),
            target_column: self.target_column,
        }
    }
}

/// A fully resolved pivot descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub pivot_table: String,
    pub owner_table: String,
    pub owner_value: Value,
    pub owner_column: String,
    pub owner_fk: String,
    pub target_fk: String,
    pub target_table: String,
    pub target_column: String,
}

/// Result of [`Query::fetch`], shaped by the query's [`Mode`].
#[derive(Debug, Clone)]
pub enum Fetched {
    Many(Vec<Entity>),
    One(Option<Entity>),
    Count(i64),
    Deleted(u64),
}

#[derive(Clone)]
pub struct Query {
    model: Model,
    joins: Vec<String>,
    wheres: Vec<String>,
    pivot: Option<Pivot>,
    pivot_scoped: bool,
    mode: Mode,
    columns: Vec<String>,
    build_error: Option<String>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table())
            .field("joins", &self.joins)
            .field("wheres", &self.wheres)
            .field("pivot", &self.pivot)
            .field("pivot_scoped", &self.pivot_scoped)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Query {
    /// Query over `model`'s table; rows come back as that model's entities.
    pub fn new(model: Model) -> Self {
        Self {
            model,
            joins: Vec::new(),
            wheres: Vec::new(),
            pivot: None,
            pivot_scoped: false,
            mode: Mode::Many,
            columns: vec!["*".to_string()],
            build_error: None,
        }
    }

    pub fn table(&self) -> &str {
        self.model.table()
    }

    pub fn primary_key(&self) -> &str {
        self.model.primary_key()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pivot(&self) -> Option<&Pivot> {
        self.pivot.as_ref()
    }

    pub fn is_pivot_scoped(&self) -> bool {
        self.pivot_scoped
    }

    fn fail(mut self, message: String) -> Self {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
        self
    }

    // ==================== WHERE ====================

    /// `key = value`, or `key IS NULL` for a null value.
    pub fn where_eq(self, key: &str, value: impl Into<Value>) -> Self {
        self.where_op(key, "=", value)
    }

    /// Predicate with an explicit operator.
    ///
    /// Supported: `= != <> < <= > >= <=> like, not like, in, not in, is, is not`.
    /// A null value turns `=`/`is`/`<=>` into `IS NULL` and `!=`/`<>`/`is not`
    /// into `IS NOT NULL`; null with any other operator is an error.
    pub fn where_op(mut self, key: &str, op: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let op = op.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();

        let template = match (op.as_str(), value.is_null()) {
            ("=" | "is" | "<=>", true) => "::key IS NULL",
            ("!=" | "<>" | "is not", true) => "::key IS NOT NULL",
            ("in", _) => "::key IN (:value)",
            ("not in", _) => "::key NOT IN (:value)",
            (_, true) => {
                return self.fail(format!("cannot compare '{key}' with NULL using '{op}'"));
            }
            ("=", _) => "::key = :value",
            ("!=", _) => "::key != :value",
            ("<>", _) => "::key <> :value",
            ("<", _) => "::key < :value",
            ("<=", _) => "::key <= :value",
            (">", _) => "::key > :value",
            (">=", _) => "::key >= :value",
            ("<=>", _) => "::key <=> :value",
            ("like", _) => "::key LIKE :value",
            ("not like", _) => "::key NOT LIKE :value",
            ("is", _) => "::key IS :value",
            ("is not", _) => "::key IS NOT :value",
            _ => return self.fail(format!("unsupported operator '{op}'")),
        };

        let value = match (op.as_str(), value) {
            ("in" | "not in", Value::List(items)) => Value::List(items),
            ("in" | "not in", single) => Value::List(vec![single]),
            (_, value) => value,
        };
        self.wheres
            .push(escape(template, &params! { "key" => key, "value" => value }));
        self
    }

    /// `key IN (values...)`; an empty list matches nothing.
    pub fn where_in<V: Into<Value>>(self, key: &str, values: impl IntoIterator<Item = V>) -> Self {
        let list = Value::List(values.into_iter().map(Into::into).collect());
        self.where_op(key, "in", list)
    }

    pub fn where_null(self, key: &str) -> Self {
        self.where_op(key, "=", Value::Null)
    }

    pub fn where_not_null(self, key: &str) -> Self {
        self.where_op(key, "!=", Value::Null)
    }

    // ==================== JOIN ====================

    /// `INNER JOIN on_table ON on_table.on_column = related_table.related_column`
    pub fn join(
        mut self,
        on_table: &str,
        on_column: &str,
        related_table: &str,
        related_column: &str,
    ) -> Self {
        self.joins.push(escape(
            "::onTable ON ::onTable.::onColumn = ::relatedTable.::relatedColumn",
            &params! {
                "onTable" => on_table,
                "onColumn" => on_column,
                "relatedTable" => related_table,
                "relatedColumn" => related_column,
            },
        ));
        self
    }

    /// Like [`Query::join`] with the joined table aliased to `alias`.
    pub fn join_as(
        mut self,
        on_table: &str,
        on_column: &str,
        related_table: &str,
        related_column: &str,
        alias: &str,
    ) -> Self {
        self.joins.push(escape(
            "::onTable AS ::alias ON ::alias.::onColumn = ::relatedTable.::relatedColumn",
            &params! {
                "onTable" => on_table,
                "alias" => alias,
                "onColumn" => on_column,
                "relatedTable" => related_table,
                "relatedColumn" => related_column,
            },
        ));
        self
    }

    // ==================== PIVOT ====================

    /// Reach this table through a junction table pinned to one owner row.
    pub fn set_pivot(mut self, spec: PivotSpec) -> Self {
        self.pivot = Some(spec.resolve(self.table()));
        self
    }

    /// Target the junction table itself, keeping only the owner pin.
    pub fn scope_to_pivot(self) -> OrmResult<Self> {
        if self.pivot_scoped {
            return Ok(self);
        }
        let Some(pivot) = &self.pivot else {
            return Err(OrmError::configuration(format!(
                "query on '{}' has no pivot",
                self.table()
            )));
        };
        let model = self.model.db().model_for_table(&pivot.pivot_table);
        Ok(Self {
            model,
            pivot_scoped: true,
            ..self
        })
    }

    fn pivot_scoped(self) -> OrmResult<(Self, Pivot)> {
        let query = self.scope_to_pivot()?;
        let pivot = query
            .pivot
            .clone()
            .ok_or_else(|| OrmError::configuration("query has no pivot"))?;
        Ok((query, pivot))
    }

    /// Build (unsaved) a junction row pointing at the owner.
    pub fn new_pivot(self, init: Row) -> OrmResult<Entity> {
        let (query, pivot) = self.pivot_scoped()?;
        let mut entity = query.model.entity_from(init);
        entity.set(&pivot.owner_fk, pivot.owner_value);
        Ok(entity)
    }

    /// Save a junction row linking the owner to `id`, plus any `extra` columns.
    pub async fn add(self, id: impl Into<Value>, extra: Row) -> OrmResult<Entity> {
        let (query, pivot) = self.pivot_scoped()?;
        let mut entity = query.model.entity();
        entity.set(&pivot.owner_fk, pivot.owner_value);
        entity.set(&pivot.target_fk, id.into());
        for (column, value) in extra {
            entity.set(&column, value);
        }
        entity.save().await?;
        Ok(entity)
    }

    /// Delete the junction rows linking the owner to `id`.
    pub async fn remove(self, id: impl Into<Value>) -> OrmResult<u64> {
        let (query, pivot) = self.pivot_scoped()?;
        query
            .model
            .db()
            .delete(
                "DELETE FROM ::table WHERE ::ownerFk = :owner AND ::targetFk = :id",
                params! {
                    "table" => pivot.pivot_table.as_str(),
                    "ownerFk" => pivot.owner_fk.as_str(),
                    "owner" => pivot.owner_value.clone(),
                    "targetFk" => pivot.target_fk.as_str(),
                    "id" => id,
                },
            )
            .await
    }

    // ==================== COMPILE ====================

    /// Projected columns (default `*`).
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = if columns.is_empty() {
            vec!["*".to_string()]
        } else {
            columns.iter().map(|c| c.to_string()).collect()
        };
        self
    }

    /// Switch to [`Mode::First`] without executing.
    pub fn first_only(mut self) -> Self {
        self.mode = Mode::First;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Compile to SQL without executing.
    pub fn to_sql(&self) -> OrmResult<String> {
        if let Some(err) = &self.build_error {
            return Err(OrmError::validation(err.clone()));
        }

        let table = self.table();
        let mut joins = self.joins.clone();
        let mut wheres = Vec::with_capacity(self.wheres.len() + 1);

        if let Some(pivot) = &self.pivot {
            if !self.pivot_scoped {
                joins.push(escape(
                    "::pivot ON ::pivot.::targetFk = ::table.::targetColumn",
                    &params! {
                        "pivot" => pivot.pivot_table.as_str(),
                        "targetFk" => pivot.target_fk.as_str(),
                        "table" => table,
                        "targetColumn" => pivot.target_column.as_str(),
                    },
                ));
                joins.push(escape(
                    "::owner AS `this` ON `this`.::ownerColumn = ::pivot.::ownerFk",
                    &params! {
                        "owner" => pivot.owner_table.as_str(),
                        "ownerColumn" => pivot.owner_column.as_str(),
                        "pivot" => pivot.pivot_table.as_str(),
                        "ownerFk" => pivot.owner_fk.as_str(),
                    },
                ));
            }
            wheres.push(escape(
                "::pivot.::ownerFk = :owner",
                &params! {
                    "pivot" => pivot.pivot_table.as_str(),
                    "ownerFk" => pivot.owner_fk.as_str(),
                    "owner" => pivot.owner_value.clone(),
                },
            ));
        }
        wheres.extend(self.wheres.iter().cloned());

        let from = escape_id(table);
        let mut sql = match self.mode {
            Mode::Count => format!("SELECT count(*) FROM {from}"),
            Mode::Delete if joins.is_empty() => format!("DELETE FROM {from}"),
            Mode::Delete => format!("DELETE {from} FROM {from}"),
            Mode::Many | Mode::First => {
                let columns = self
                    .columns
                    .iter()
                    .map(|c| {
                        if joins.is_empty() || c.contains('.') {
                            escape_id(c)
                        } else {
                            escape_id(&format!("{table}.{c}"))
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("SELECT {columns} FROM {from}")
            }
        };

        for join in &joins {
            sql.push_str(" INNER JOIN ");
            sql.push_str(join);
        }
        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres.join(" AND "));
        }
        if self.mode == Mode::First {
            sql.push_str(" LIMIT 1");
        }
        Ok(sql)
    }

    fn statement(&self) -> OrmResult<Statement> {
        let sql = self.to_sql()?;
        Ok(match self.mode {
            Mode::Count => Statement::count(sql, Params::new()),
            Mode::Delete => Statement::delete(sql, Params::new()),
            Mode::Many | Mode::First => Statement::select(sql, Params::new()),
        })
    }

    // ==================== EXECUTE ====================

    /// Execute in the current mode.
    pub async fn fetch(self) -> OrmResult<Fetched> {
        let statement = self.statement()?;
        let output = self
            .model
            .db()
            .execute(vec![statement])
            .await?
            .pop()
            .ok_or_else(|| OrmError::execution("query produced no result"))?;

        Ok(match (self.mode, output) {
            (Mode::Count, Output::Count(n)) => Fetched::Count(n),
            (Mode::Delete, Output::Affected(n)) => Fetched::Deleted(n),
            (Mode::First, output) => {
                let row = output.into_rows()?.into_iter().next();
                Fetched::One(row.map(|row| self.model.entity_from(row)))
            }
            (Mode::Many, output) => Fetched::Many(
                output
                    .into_rows()?
                    .into_iter()
                    .map(|row| self.model.entity_from(row))
                    .collect(),
            ),
            (mode, output) => {
                return Err(OrmError::execution(format!(
                    "unexpected {output:?} for {mode:?} query"
                )));
            }
        })
    }

    /// Every matching row.
    pub async fn get(self) -> OrmResult<Vec<Entity>> {
        match self.with_mode(Mode::Many).fetch().await? {
            Fetched::Many(entities) => Ok(entities),
            other => Err(OrmError::execution(format!("unexpected {other:?}"))),
        }
    }

    /// The first matching row, if any.
    pub async fn first(self) -> OrmResult<Option<Entity>> {
        match self.with_mode(Mode::First).fetch().await? {
            Fetched::One(entity) => Ok(entity),
            other => Err(OrmError::execution(format!("unexpected {other:?}"))),
        }
    }

    pub async fn count(self) -> OrmResult<i64> {
        match self.with_mode(Mode::Count).fetch().await? {
            Fetched::Count(n) => Ok(n),
            other => Err(OrmError::execution(format!("unexpected {other:?}"))),
        }
    }

    /// Delete every matching row; returns the affected row count.
    pub async fn delete(self) -> OrmResult<u64> {
        match self.with_mode(Mode::Delete).fetch().await? {
            Fetched::Deleted(n) => Ok(n),
            other => Err(OrmError::execution(format!("unexpected {other:?}"))),
        }
    }

    /// Row whose primary key equals `id`.
    pub async fn find(self, id: impl Into<Value>) -> OrmResult<Option<Entity>> {
        let pk = self.primary_key().to_string();
        self.where_eq(&pk, id).first().await
    }
}
