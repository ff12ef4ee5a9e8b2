//! Batched execution against one named database.
//!
//! Every call escapes its statements, joins them with `"; "` and sends the
//! batch in a single round trip. Results come back positionally and are
//! post-processed according to each statement's [`StatementKind`].

use crate::config::DbConfig;
use crate::entity::Model;
use crate::error::{OrmError, OrmResult};
use crate::escape::{Params, escape};
use crate::executor::ResultSet;
use crate::orm::Orm;
use crate::query::Query;
use crate::schema::Schema;
use crate::value::Row;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Decides how a statement's result set is post-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Count,
    Query,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Count => "count",
            Self::Query => "query",
        };
        f.write_str(s)
    }
}

/// A statement template with its parameters, escaped at execution time.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub template: String,
    pub params: Params,
}

impl Statement {
    pub fn new(kind: StatementKind, template: impl Into<String>, params: Params) -> Self {
        Self {
            kind,
            template: template.into(),
            params,
        }
    }

    pub fn select(template: impl Into<String>, params: Params) -> Self {
        Self::new(StatementKind::Select, template, params)
    }

    pub fn insert(template: impl Into<String>, params: Params) -> Self {
        Self::new(StatementKind::Insert, template, params)
    }

    pub fn update(template: impl Into<String>, params: Params) -> Self {
        Self::new(StatementKind::Update, template, params)
    }

    pub fn delete(template: impl Into<String>, params: Params) -> Self {
        Self::new(StatementKind::Delete, template, params)
    }

    pub fn count(template: impl Into<String>, params: Params) -> Self {
        Self::new(StatementKind::Count, template, params)
    }

    pub fn query(template: impl Into<String>, params: Params) -> Self {
        Self::new(StatementKind::Query, template, params)
    }

    /// The escaped SQL text.
    pub fn to_sql(&self) -> String {
        escape(&self.template, &self.params)
    }
}

/// Post-processed result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// First column of the first row of a `count` statement.
    Count(i64),
    /// Generated key of an `insert`.
    InsertId(Option<u64>),
    /// Affected rows of a `delete`.
    Affected(u64),
    Rows(Vec<Row>),
    /// Raw result of an `update` or free-form `query`.
    Done(ResultSet),
}

impl Output {
    pub fn count(&self) -> Option<i64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn insert_id(&self) -> Option<u64> {
        match self {
            Self::InsertId(id) => *id,
            _ => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            Self::Affected(n) => Some(*n),
            Self::Done(set) => Some(set.affected_rows),
            _ => None,
        }
    }

    pub fn into_rows(self) -> OrmResult<Vec<Row>> {
        match self {
            Self::Rows(rows) => Ok(rows),
            Self::Done(set) => Ok(set.rows),
            other => Err(OrmError::execution(format!(
                "expected rows, got {other:?}"
            ))),
        }
    }

    fn from_set(kind: StatementKind, set: ResultSet) -> OrmResult<Self> {
        Ok(match kind {
            StatementKind::Count => {
                let count = set
                    .rows
                    .first()
                    .and_then(|row| row.get_index(0))
                    .ok_or_else(|| OrmError::decode("count(*)", "count returned no rows"))?;
                let count = count
                    .as_i64()
                    .ok_or_else(|| OrmError::decode("count(*)", format!("not an integer: {count:?}")))?;
                Self::Count(count)
            }
            StatementKind::Insert => Self::InsertId(set.last_insert_id),
            StatementKind::Delete => Self::Affected(set.affected_rows),
            StatementKind::Select => Self::Rows(set.rows),
            StatementKind::Update | StatementKind::Query => Self::Done(set),
        })
    }
}

/// Handle to one configured database ("core").
///
/// Cheap to clone. No connection is held between calls.
#[derive(Clone)]
pub struct Db {
    orm: Orm,
    core: Arc<str>,
    config: Arc<DbConfig>,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("core", &self.core)
            .field("database", &self.config.name)
            .finish()
    }
}

impl Db {
    pub(crate) fn new(orm: Orm, core: &str, config: Arc<DbConfig>) -> Self {
        Self {
            orm,
            core: Arc::from(core),
            config,
        }
    }

    pub fn core(&self) -> &str {
        &self.core
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    /// Run statements as one batch and post-process each result by kind.
    pub async fn execute(&self, statements: Vec<Statement>) -> OrmResult<Vec<Output>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let sql = statements
            .iter()
            .map(Statement::to_sql)
            .collect::<Vec<_>>()
            .join("; ");
        let sets = self.run(&sql, statements.len()).await?;
        statements
            .iter()
            .zip(sets)
            .map(|(statement, set)| Output::from_set(statement.kind, set))
            .collect()
    }

    /// Like [`Db::execute`], wrapped in `START TRANSACTION` / `COMMIT`.
    ///
    /// A failing statement ends the batch before `COMMIT`; closing the
    /// connection then rolls the transaction back.
    pub async fn execute_atomic(&self, statements: Vec<Statement>) -> OrmResult<Vec<Output>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = String::from("START TRANSACTION");
        for statement in &statements {
            sql.push_str("; ");
            sql.push_str(&statement.to_sql());
        }
        sql.push_str("; COMMIT");

        let mut sets = self.run(&sql, statements.len() + 2).await?;
        sets.pop();
        statements
            .iter()
            .zip(sets.into_iter().skip(1))
            .map(|(statement, set)| Output::from_set(statement.kind, set))
            .collect()
    }

    async fn run(&self, sql: &str, expected: usize) -> OrmResult<Vec<ResultSet>> {
        let started = Instant::now();
        if self.config.output_queries {
            tracing::info!(target: "rowbase.sql", core = %self.core, statements = expected, sql = %sql);
        } else {
            tracing::debug!(target: "rowbase.sql", core = %self.core, statements = expected, sql = %sql);
        }

        let sets = match self.orm.executor().run(&self.config, sql).await {
            Ok(sets) => sets,
            Err(err) => {
                tracing::warn!(target: "rowbase.sql", core = %self.core, error = %err, "batch failed");
                return Err(err);
            }
        };
        tracing::trace!(
            target: "rowbase.sql",
            core = %self.core,
            elapsed_us = started.elapsed().as_micros() as u64,
            "batch complete"
        );

        if sets.len() != expected {
            return Err(OrmError::execution(format!(
                "expected {expected} result set(s), got {}",
                sets.len()
            )));
        }
        Ok(sets)
    }

    async fn single(&self, statement: Statement) -> OrmResult<Output> {
        self.execute(vec![statement])
            .await?
            .pop()
            .ok_or_else(|| OrmError::execution("statement produced no result"))
    }

    pub async fn select(&self, template: &str, params: Params) -> OrmResult<Vec<Row>> {
        self.single(Statement::select(template, params))
            .await?
            .into_rows()
    }

    /// Returns the generated key, if any.
    pub async fn insert(&self, template: &str, params: Params) -> OrmResult<Option<u64>> {
        Ok(self
            .single(Statement::insert(template, params))
            .await?
            .insert_id())
    }

    pub async fn update(&self, template: &str, params: Params) -> OrmResult<ResultSet> {
        match self.single(Statement::update(template, params)).await? {
            Output::Done(set) => Ok(set),
            other => Err(OrmError::execution(format!("unexpected update result {other:?}"))),
        }
    }

    /// Returns the number of deleted rows.
    pub async fn delete(&self, template: &str, params: Params) -> OrmResult<u64> {
        Ok(self
            .single(Statement::delete(template, params))
            .await?
            .affected()
            .unwrap_or(0))
    }

    pub async fn count(&self, template: &str, params: Params) -> OrmResult<i64> {
        self.single(Statement::count(template, params))
            .await?
            .count()
            .ok_or_else(|| OrmError::execution("count statement returned no count"))
    }

    /// Free-form statement (DDL, SET, ...).
    pub async fn query(&self, template: &str, params: Params) -> OrmResult<ResultSet> {
        match self.single(Statement::query(template, params)).await? {
            Output::Done(set) => Ok(set),
            other => Err(OrmError::execution(format!("unexpected query result {other:?}"))),
        }
    }

    /// Query builder for `table`, bound to its registered model if there is one.
    pub fn table(&self, table: &str) -> Query {
        Query::new(self.model_for_table(table))
    }

    /// Model registered under `name` in this database.
    pub fn model(&self, name: &str) -> OrmResult<Model> {
        let def = self.orm.registry().by_name(&self.core, name).ok_or_else(|| {
            OrmError::configuration(format!("no model '{name}' registered for '{}'", self.core))
        })?;
        Ok(Model::new(self.clone(), def))
    }

    /// Registered model for `table`, or a generic one keyed on `id`.
    pub fn model_for_table(&self, table: &str) -> Model {
        Model::new(self.clone(), self.orm.registry().resolve(&self.core, table))
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use crate::params;

    fn db(mock: &MockExecutor) -> Db {
        Orm::builder()
            .database("main", DbConfig::new("app"))
            .executor(mock.clone())
            .build()
            .unwrap()
            .db("main")
            .unwrap()
    }

    #[tokio::test]
    async fn batch_results_follow_statement_kinds() {
        let mock = MockExecutor::new();
        mock.push_response(vec![
            ResultSet::with_rows(vec![Row::new().with("count(*)", 42)]),
            ResultSet::inserted(7),
            ResultSet::affected(3),
        ]);
        let out = db(&mock)
            .execute(vec![
                Statement::count("SELECT count(*) FROM ::t", params! { "t" => "post" }),
                Statement::insert("INSERT INTO ::t SET ::c = :v", params! { "t" => "post", "c" => "title", "v" => "x" }),
                Statement::delete("DELETE FROM ::t WHERE ::c = :v", params! { "t" => "post", "c" => "id", "v" => 1 }),
            ])
            .await
            .unwrap();

        assert_eq!(out, vec![Output::Count(42), Output::InsertId(Some(7)), Output::Affected(3)]);
        assert_eq!(
            mock.last_sql().unwrap(),
            "SELECT count(*) FROM `post`; INSERT INTO `post` SET `title` = 'x'; DELETE FROM `post` WHERE `id` = 1"
        );
    }

    #[tokio::test]
    async fn result_count_mismatch_is_an_error() {
        let mock = MockExecutor::new();
        mock.push_response(vec![ResultSet::default()]);
        let err = db(&mock)
            .execute(vec![
                Statement::query("SELECT 1", Params::new()),
                Statement::query("SELECT 2", Params::new()),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Execution(_)));
    }

    #[tokio::test]
    async fn atomic_batches_are_wrapped_and_unwrapped() {
        let mock = MockExecutor::starting_at(5);
        let out = db(&mock)
            .execute_atomic(vec![
                Statement::insert("INSERT INTO `a` () VALUES ()", Params::new()),
                Statement::insert("INSERT INTO `b` () VALUES ()", Params::new()),
            ])
            .await
            .unwrap();
        assert_eq!(out, vec![Output::InsertId(Some(5)), Output::InsertId(Some(6))]);
        assert_eq!(
            mock.last_sql().unwrap(),
            "START TRANSACTION; INSERT INTO `a` () VALUES (); INSERT INTO `b` () VALUES (); COMMIT"
        );
    }

    #[tokio::test]
    async fn errors_abort_the_batch() {
        let mock = MockExecutor::new();
        mock.push_error(OrmError::Connection("refused".into()));
        let err = db(&mock).select("SELECT 1", Params::new()).await.unwrap_err();
        assert!(matches!(err, OrmError::Connection(_)));
    }

    #[tokio::test]
    async fn empty_batch_skips_the_round_trip() {
        let mock = MockExecutor::new();
        assert!(db(&mock).execute(Vec::new()).await.unwrap().is_empty());
        assert!(mock.sql().is_empty());
    }

    #[tokio::test]
    async fn single_statement_helpers() {
        let mock = MockExecutor::new();
        let db = db(&mock);
        mock.push_rows(vec![Row::new().with("id", 1)]);
        let rows = db.select("SELECT * FROM `post`", Params::new()).await.unwrap();
        assert_eq!(rows.len(), 1);

        assert_eq!(db.insert("INSERT INTO `post` () VALUES ()", Params::new()).await.unwrap(), Some(1));

        mock.push_response(vec![ResultSet::affected(2)]);
        assert_eq!(db.delete("DELETE FROM `post`", Params::new()).await.unwrap(), 2);

        mock.push_rows(vec![Row::new().with("count(*)", 9)]);
        assert_eq!(db.count("SELECT count(*) FROM `post`", Params::new()).await.unwrap(), 9);
    }
}
