//! DDL builder: table definitions rendered to `CREATE TABLE` / `ALTER TABLE`.
//!
//! ```ignore
//! db.schema()
//!     .create("post", |t| {
//!         t.id("id");
//!         t.string("title").length(120);
//!         t.reference("userId").nullable();
//!         t.timestamps();
//!     })
//!     .await?;
//! ```

use crate::db::{Db, Statement};
use crate::error::{OrmError, OrmResult};
use crate::escape::{Params, escape_id, escape_value};
use crate::params;
use crate::query::pivot_table_name;
use crate::value::Value;
use std::fmt;

/// Column type with its display width or precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bit(u32),
    TinyInt(u32),
    SmallInt(u32),
    MediumInt(u32),
    Int(u32),
    Varchar(u32),
    /// Precision, scale.
    Decimal(u32, u32),
    Float(u32, u32),
    Blob,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Text,
}

impl ColumnType {
    fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Bit(_)
                | Self::TinyInt(_)
                | Self::SmallInt(_)
                | Self::MediumInt(_)
                | Self::Int(_)
                | Self::Boolean
        )
    }

    fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::Timestamp)
    }

    fn with_length(self, length: u32) -> Self {
        match self {
            Self::Bit(_) => Self::Bit(length),
            Self::TinyInt(_) => Self::TinyInt(length),
            Self::SmallInt(_) => Self::SmallInt(length),
            Self::MediumInt(_) => Self::MediumInt(length),
            Self::Int(_) => Self::Int(length),
            Self::Varchar(_) => Self::Varchar(length),
            other => other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(n) => write!(f, "bit({n})"),
            Self::TinyInt(n) => write!(f, "tinyint({n})"),
            Self::SmallInt(n) => write!(f, "smallint({n})"),
            Self::MediumInt(n) => write!(f, "mediumint({n})"),
            Self::Int(n) => write!(f, "int({n})"),
            Self::Varchar(n) => write!(f, "varchar({n})"),
            Self::Decimal(p, s) => write!(f, "decimal({p},{s})"),
            Self::Float(p, s) => write!(f, "float({p},{s})"),
            Self::Blob => f.write_str("blob"),
            Self::TinyBlob => f.write_str("tinyblob"),
            Self::MediumBlob => f.write_str("mediumblob"),
            Self::LongBlob => f.write_str("longblob"),
            Self::Boolean => f.write_str("boolean"),
            Self::Date => f.write_str("date"),
            Self::DateTime => f.write_str("datetime"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Text => f.write_str("text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    primary: bool,
    unsigned: bool,
    increment: bool,
    default: Option<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            primary: false,
            unsigned: false,
            increment: false,
            default: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    pub fn increment(&mut self) -> &mut Self {
        self.increment = true;
        self
    }

    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Display width for bit/integer types, length for strings.
    pub fn length(&mut self, length: u32) -> &mut Self {
        self.column_type = self.column_type.with_length(length);
        self
    }

    /// Column definition without the trailing `PRIMARY KEY` item.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", escape_id(&self.name), self.column_type);
        if self.unsigned {
            sql.push_str(" UNSIGNED");
        }
        if self.increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        } else if self.column_type == ColumnType::Timestamp {
            sql.push_str(" NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.default_sql(default));
        }
        sql
    }

    fn default_sql(&self, value: &Value) -> String {
        match value {
            Value::Null | Value::Bool(_) => escape_value(value),
            _ if self.column_type.is_numeric() => escape_value(value),
            Value::Text(s)
                if self.column_type.is_temporal() && s.eq_ignore_ascii_case("current_timestamp") =>
            {
                "CURRENT_TIMESTAMP".to_string()
            }
            _ if matches!(self.column_type, ColumnType::Varchar(_)) => escape_value(value),
            _ => format!("({})", escape_value(value)),
        }
    }
}

/// Table definition handed to [`Schema::create`] and [`Schema::table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    drops: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            drops: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn add_column(&mut self, name: &str, column_type: ColumnType) -> &mut Column {
        self.columns.push(Column::new(name, column_type));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    pub fn bit(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Bit(1))
    }

    pub fn blob(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Blob)
    }

    pub fn boolean(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Boolean)
    }

    pub fn date(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Date)
    }

    pub fn datetime(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::DateTime)
    }

    pub fn decimal(&mut self, name: &str, precision: u32, scale: u32) -> &mut Column {
        self.add_column(name, ColumnType::Decimal(precision, scale))
    }

    pub fn float(&mut self, name: &str, precision: u32, scale: u32) -> &mut Column {
        self.add_column(name, ColumnType::Float(precision, scale))
    }

    /// Unsigned auto-increment primary key.
    pub fn id(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Int(11))
            .unsigned()
            .primary()
            .increment()
    }

    pub fn integer(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Int(11))
    }

    pub fn long_blob(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::LongBlob)
    }

    pub fn medium_blob(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::MediumBlob)
    }

    pub fn medium_integer(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::MediumInt(8))
    }

    /// Unsigned integer matching an [`Table::id`] column.
    pub fn reference(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Int(11)).unsigned()
    }

    pub fn small_integer(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::SmallInt(6))
    }

    pub fn string(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Varchar(255))
    }

    pub fn text(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Text)
    }

    pub fn timestamp(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::Timestamp)
    }

    pub fn tiny_blob(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::TinyBlob)
    }

    pub fn tiny_integer(&mut self, name: &str) -> &mut Column {
        self.add_column(name, ColumnType::TinyInt(3))
    }

    /// Nullable `createdAt` / `updatedAt` timestamps.
    pub fn timestamps(&mut self) {
        self.timestamp("createdAt").nullable().default(Value::Null);
        self.timestamp("updatedAt").nullable().default(Value::Null);
    }

    pub fn drop_column(&mut self, name: &str) {
        self.drops.push(name.to_string());
    }

    fn items(&self) -> Vec<String> {
        let mut items = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            items.push(column.to_sql());
            if column.primary {
                items.push(format!("PRIMARY KEY ({})", escape_id(&column.name)));
            }
        }
        items
    }

    pub fn create_sql(&self) -> OrmResult<String> {
        if self.columns.is_empty() {
            return Err(OrmError::validation(format!(
                "table '{}' has no columns",
                self.name
            )));
        }
        Ok(format!(
            "CREATE TABLE {} ({})",
            escape_id(&self.name),
            self.items().join(", ")
        ))
    }

    /// One statement for added columns, one for dropped columns.
    pub fn alter_statements(&self) -> OrmResult<Vec<String>> {
        let table = escape_id(&self.name);
        let mut statements = Vec::with_capacity(2);
        let adds = self.items();
        if !adds.is_empty() {
            let adds: Vec<String> = adds.into_iter().map(|item| format!("ADD {item}")).collect();
            statements.push(format!("ALTER TABLE {table} {}", adds.join(", ")));
        }
        if !self.drops.is_empty() {
            let drops: Vec<String> = self
                .drops
                .iter()
                .map(|c| format!("DROP {}", escape_id(c)))
                .collect();
            statements.push(format!("ALTER TABLE {table} {}", drops.join(", ")));
        }
        if statements.is_empty() {
            return Err(OrmError::validation(format!(
                "alter of '{}' changes nothing",
                self.name
            )));
        }
        Ok(statements)
    }

    pub fn alter_sql(&self) -> OrmResult<String> {
        Ok(self.alter_statements()?.join("; "))
    }
}

/// Schema operations on one database.
#[derive(Debug, Clone)]
pub struct Schema {
    db: Db,
}

impl Schema {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    async fn run(&self, statements: Vec<String>) -> OrmResult<()> {
        let statements = statements
            .into_iter()
            .map(|sql| Statement::query(sql, Params::new()))
            .collect();
        self.db.execute(statements).await?;
        Ok(())
    }

    pub async fn create(&self, name: &str, define: impl FnOnce(&mut Table)) -> OrmResult<()> {
        let mut table = Table::new(name);
        define(&mut table);
        self.run(vec![table.create_sql()?]).await
    }

    /// Junction table for `a` and `b`: `id` plus a reference to each table.
    pub async fn pivot(&self, a: &str, b: &str, define: impl FnOnce(&mut Table)) -> OrmResult<()> {
        let mut names = [a, b];
        names.sort_unstable();
        let mut table = Table::new(pivot_table_name(a, b));
        table.id("id");
        table.reference(&format!("{}Id", names[0]));
        table.reference(&format!("{}Id", names[1]));
        define(&mut table);
        self.run(vec![table.create_sql()?]).await
    }

    /// Alter an existing table.
    pub async fn table(&self, name: &str, define: impl FnOnce(&mut Table)) -> OrmResult<()> {
        let mut table = Table::new(name);
        define(&mut table);
        self.run(table.alter_statements()?).await
    }

    pub async fn drop(&self, name: &str) -> OrmResult<()> {
        self.db
            .query("DROP TABLE ::table", params! { "table" => name })
            .await?;
        Ok(())
    }

    pub async fn drop_if_exists(&self, name: &str) -> OrmResult<()> {
        self.db
            .query("DROP TABLE IF EXISTS ::table", params! { "table" => name })
            .await?;
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> OrmResult<bool> {
        let count = self
            .db
            .count(
                "SELECT count(*) FROM information_schema.tables \
                 WHERE table_schema = :database AND table_name = :table",
                params! { "database" => self.db.config().name.as_str(), "table" => name },
            )
            .await?;
        Ok(count > 0)
    }

    /// Every table of the database, sorted by name.
    pub async fn tables(&self) -> OrmResult<Vec<String>> {
        let rows = self
            .db
            .select(
                "SELECT table_name AS name FROM information_schema.tables \
                 WHERE table_schema = :database ORDER BY table_name",
                params! { "database" => self.db.config().name.as_str() },
            )
            .await?;
        rows.iter()
            .map(|row| {
                row.try_get("name")?
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| OrmError::decode("name", "table name is not text"))
            })
            .collect()
    }

    /// Drop every table with foreign key checks disabled; returns how many.
    pub async fn drop_all(&self) -> OrmResult<usize> {
        let tables = self.tables().await?;
        if tables.is_empty() {
            return Ok(0);
        }
        let mut statements = Vec::with_capacity(tables.len() + 2);
        statements.push("SET FOREIGN_KEY_CHECKS = 0".to_string());
        statements.extend(tables.iter().map(|t| format!("DROP TABLE {}", escape_id(t))));
        statements.push("SET FOREIGN_KEY_CHECKS = 1".to_string());
        self.run(statements).await?;
        Ok(tables.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_order() {
        let mut table = Table::new("post");
        table.id("id");
        table.string("title").length(120).default("untitled");
        table.tiny_integer("rank").unsigned().nullable().default(0);
        table.timestamps();
        assert_eq!(
            table.create_sql().unwrap(),
            "CREATE TABLE `post` (\
             `id` int(11) UNSIGNED AUTO_INCREMENT NOT NULL, PRIMARY KEY (`id`), \
             `title` varchar(120) NOT NULL DEFAULT 'untitled', \
             `rank` tinyint(3) UNSIGNED DEFAULT 0, \
             `createdAt` timestamp NULL DEFAULT NULL, \
             `updatedAt` timestamp NULL DEFAULT NULL)"
        );
    }

    #[test]
    fn type_defaults() {
        let mut table = Table::new("t");
        table.bit("b");
        table.small_integer("s");
        table.medium_integer("m");
        table.integer("i");
        table.decimal("d", 10, 2);
        table.float("f", 6, 3);
        table.long_blob("lb");
        let types: Vec<String> = table.columns().iter().map(|c| c.column_type().to_string()).collect();
        assert_eq!(
            types,
            ["bit(1)", "smallint(6)", "mediumint(8)", "int(11)", "decimal(10,2)", "float(6,3)", "longblob"]
        );
    }

    #[test]
    fn default_rendering() {
        let mut table = Table::new("t");
        table.datetime("at").default("current_timestamp");
        table.boolean("flag").default(true);
        table.text("body").nullable().default("none");
        table.date("day").nullable().default("2020-01-01");
        let sql = table.create_sql().unwrap();
        assert!(sql.contains("`at` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP"), "{sql}");
        assert!(sql.contains("`flag` boolean NOT NULL DEFAULT true"), "{sql}");
        assert!(sql.contains("`body` text DEFAULT ('none')"), "{sql}");
        assert!(sql.contains("`day` date DEFAULT ('2020-01-01')"), "{sql}");
    }

    #[test]
    fn alter_adds_then_drops() {
        let mut table = Table::new("post");
        table.string("slug").nullable();
        table.drop_column("legacy");
        table.drop_column("old");
        assert_eq!(
            table.alter_sql().unwrap(),
            "ALTER TABLE `post` ADD `slug` varchar(255); ALTER TABLE `post` DROP `legacy`, DROP `old`"
        );

        let mut only_drop = Table::new("post");
        only_drop.drop_column("legacy");
        assert_eq!(only_drop.alter_sql().unwrap(), "ALTER TABLE `post` DROP `legacy`");
    }

    #[test]
    fn empty_definitions_are_rejected() {
        let table = Table::new("post");
        assert!(matches!(table.alter_sql(), Err(OrmError::Validation(_))));
        assert!(matches!(table.create_sql(), Err(OrmError::Validation(_))));
    }
}
