//! # rowbase
//!
//! A lightweight active-record data access layer for MySQL.
//!
//! ## Features
//!
//! - **Escaped templates**: `::name` placeholders become quoted identifiers,
//!   `:name` placeholders become literals; every statement is plain SQL text
//! - **Batches**: several statements travel in one round trip and come back
//!   positionally, optionally wrapped in a transaction
//! - **Query builder**: owned, chainable builders with joins and pivot tables
//! - **Models**: entities with timestamps, date normalization and declared
//!   relationships
//! - **Schema and migrations**: a DDL builder and a ledger-tracked migrator
//!
//! ## Example
//!
//! ```ignore
//! use rowbase::prelude::*;
//!
//! let orm = Orm::builder()
//!     .config(Config::load("rowbase.toml")?)
//!     .model(
//!         ModelDef::new("main", "post")
//!             .timestamps(true)
//!             .relationship("comments", "post/id postId/comment"),
//!     )
//!     .build()?;
//!
//! let db = orm.db("main")?;
//! let mut post = db.model("post")?.entity().with("title", "Hello");
//! post.save().await?;
//!
//! let comments = post.relation("comments")?.get().await?;
//! let drafts = db.table("post").where_eq("status", "draft").count().await?;
//! ```

pub mod config;
pub mod date;
pub mod db;
pub mod entity;
pub mod error;
pub mod escape;
pub mod executor;
pub mod migrate;
pub mod mock;
pub mod model;
pub mod orm;
pub mod prelude;
pub mod query;
pub mod registry;
pub mod relation;
pub mod schema;
pub mod value;

pub use config::{Config, DbConfig, Mode};
pub use db::{Db, Output, Statement, StatementKind};
pub use entity::{Entity, Model, save_all};
pub use error::{OrmError, OrmResult};
pub use escape::{Params, escape, escape_id, escape_value};
pub use executor::{Executor, MySqlExecutor, ResultSet};
pub use migrate::{AppliedMigration, Migration, MigrationStatus, Migrator, display_name};
pub use mock::MockExecutor;
pub use model::{ModelDef, ModelKind, Timestamps};
pub use orm::{Orm, OrmBuilder};
pub use query::{Fetched, Pivot, PivotSpec, Query, foreign_key, pivot_table_name};
pub use registry::Registry;
pub use relation::{RelationPath, Relationship};
pub use schema::{Column, ColumnType, Schema, Table};
pub use value::{Row, Value};

pub use async_trait::async_trait;
