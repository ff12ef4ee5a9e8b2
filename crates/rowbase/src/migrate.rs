//! Code-defined migrations tracked in a ledger table.
//!
//! Each database keeps a ledger (`migration` unless configured otherwise) with
//! one row per applied migration. Migrations are ordered by name, so names
//! carry a sortable `YYYY_MM_DD_HHMMSS_` prefix:
//!
//! ```ignore
//! struct CreatePost;
//!
//! #[async_trait]
//! impl Migration for CreatePost {
//!     fn name(&self) -> &str {
//!         "2024_01_15_093000_create_post_table"
//!     }
//!
//!     async fn up(&self, schema: &Schema) -> OrmResult<()> {
//!         schema.create("post", |t| {
//!             t.id("id");
//!             t.string("title");
//!         }).await
//!     }
//!
//!     async fn down(&self, schema: &Schema) -> OrmResult<()> {
//!         schema.drop("post").await
//!     }
//! }
//!
//! let migrator = Migrator::new(db, vec![Arc::new(CreatePost)])?;
//! migrator.up(None).await?;
//! ```

use crate::date::{FORMAT, now_string};
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::params;
use crate::schema::Schema;
use crate::value::Value;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use heck::ToSnakeCase;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// Length of the `YYYY_MM_DD_HHMMSS_` name prefix.
const PREFIX_LEN: usize = 18;

#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique, sortable name recorded in the ledger.
    fn name(&self) -> &str;

    async fn up(&self, schema: &Schema) -> OrmResult<()>;

    async fn down(&self, schema: &Schema) -> OrmResult<()>;
}

/// Ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub name: String,
    pub migrated_at: Option<NaiveDateTime>,
}

/// Local migrations compared against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationStatus {
    pub local: Vec<String>,
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<String>,
    /// Applied migrations no longer defined locally.
    pub missing_local: Vec<AppliedMigration>,
}

impl MigrationStatus {
    pub fn is_applied(&self, name: &str) -> bool {
        self.applied.iter().any(|m| m.name == name)
    }
}

fn prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9]{4}_[0-9]{2}_[0-9]{2}_[0-9]{6}_").expect("invalid built-in prefix regex")
    })
}

/// Human-readable migration name: timestamp prefix removed, words spaced.
///
/// `2024_01_15_093000_createPostTable` becomes `create post table`.
pub fn display_name(name: &str) -> String {
    let rest = if prefix_re().is_match(name) {
        &name[PREFIX_LEN..]
    } else {
        name
    };
    rest.to_snake_case().replace('_', " ")
}

/// Runs migrations for one database.
pub struct Migrator {
    db: Db,
    migrations: Vec<Arc<dyn Migration>>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("core", &self.db.core())
            .field("migrations", &self.names())
            .finish()
    }
}

impl Migrator {
    /// Sorts `migrations` by name; duplicate names are rejected.
    pub fn new(db: Db, mut migrations: Vec<Arc<dyn Migration>>) -> OrmResult<Self> {
        migrations.sort_by(|a, b| a.name().cmp(b.name()));
        if let Some(pair) = migrations.windows(2).find(|w| w[0].name() == w[1].name()) {
            return Err(OrmError::migration(format!(
                "migration '{}' is defined twice",
                pair[0].name()
            )));
        }
        Ok(Self { db, migrations })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Local migration names in apply order.
    pub fn names(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.name()).collect()
    }

    fn ledger(&self) -> &str {
        &self.db.config().migration_table
    }

    fn local(&self, name: &str) -> Option<&Arc<dyn Migration>> {
        self.migrations.iter().find(|m| m.name() == name)
    }

    /// Compare local migrations with the ledger without creating it.
    pub async fn status(&self) -> OrmResult<MigrationStatus> {
        let applied = if self.db.schema().exists(self.ledger()).await? {
            self.applied().await?
        } else {
            Vec::new()
        };
        Ok(self.compare(applied))
    }

    fn compare(&self, applied: Vec<AppliedMigration>) -> MigrationStatus {
        let applied_names: HashSet<&str> = applied.iter().map(|m| m.name.as_str()).collect();
        let local = self.names();
        let local_names: HashSet<&str> = local.iter().copied().collect();

        let pending = local
            .iter()
            .filter(|name| !applied_names.contains(*name))
            .map(|name| name.to_string())
            .collect();
        let missing_local = applied
            .iter()
            .filter(|m| !local_names.contains(m.name.as_str()))
            .cloned()
            .collect();

        MigrationStatus {
            local: local.into_iter().map(str::to_string).collect(),
            applied,
            pending,
            missing_local,
        }
    }

    /// Create the ledger if needed; returns whether it already existed.
    pub async fn ensure_ledger(&self) -> OrmResult<bool> {
        let schema = self.db.schema();
        if schema.exists(self.ledger()).await? {
            return Ok(true);
        }
        schema
            .create(self.ledger(), |t| {
                t.string("name").primary();
                t.datetime("migratedAt").nullable().default(Value::Null);
            })
            .await?;
        tracing::info!(
            target: "rowbase.migrate",
            core = %self.db.core(),
            table = %self.ledger(),
            "created migration ledger"
        );
        Ok(false)
    }

    /// Ledger rows in the order they were applied.
    pub async fn applied(&self) -> OrmResult<Vec<AppliedMigration>> {
        let rows = self
            .db
            .select(
                "SELECT `name`, `migratedAt` FROM ::table ORDER BY `migratedAt`, `name`",
                params! { "table" => self.ledger() },
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                let name = row
                    .try_get("name")?
                    .as_str()
                    .ok_or_else(|| OrmError::decode("name", "migration name is not text"))?
                    .to_string();
                let migrated_at = match row.get("migratedAt") {
                    Some(Value::DateTime(dt)) => Some(*dt),
                    Some(Value::Text(s)) => NaiveDateTime::parse_from_str(s, FORMAT).ok(),
                    _ => None,
                };
                Ok(AppliedMigration { name, migrated_at })
            })
            .collect()
    }

    async fn ledger_rows(&self) -> OrmResult<Vec<AppliedMigration>> {
        if self.ensure_ledger().await? {
            self.applied().await
        } else {
            Ok(Vec::new())
        }
    }

    /// Apply up to `steps` pending migrations (all when `None`).
    ///
    /// Returns the names applied. Stops at the first failure; the ledger
    /// then holds exactly the migrations that completed.
    pub async fn up(&self, steps: Option<usize>) -> OrmResult<Vec<String>> {
        let status = self.compare(self.ledger_rows().await?);
        let steps = steps.unwrap_or(usize::MAX).min(status.pending.len());
        if steps == 0 {
            tracing::info!(target: "rowbase.migrate", core = %self.db.core(), "already up to date");
            return Ok(Vec::new());
        }

        let schema = self.db.schema();
        let mut done = Vec::with_capacity(steps);
        for name in status.pending.into_iter().take(steps) {
            let migration = self
                .local(&name)
                .ok_or_else(|| OrmError::migration(format!("migration '{name}' not found")))?;
            tracing::info!(target: "rowbase.migrate", core = %self.db.core(), "migrating {}", display_name(&name));

            if let Err(err) = migration.up(&schema).await {
                tracing::warn!(target: "rowbase.migrate", migration = %name, error = %err, "migration failed");
                return Err(err);
            }
            self.db
                .insert(
                    "INSERT INTO ::table (`name`, `migratedAt`) VALUES (:name, :migratedAt)",
                    params! {
                        "table" => self.ledger(),
                        "name" => name.as_str(),
                        "migratedAt" => now_string(),
                    },
                )
                .await?;
            tracing::info!(target: "rowbase.migrate", core = %self.db.core(), "migrated {}", display_name(&name));
            done.push(name);
        }
        Ok(done)
    }

    /// Roll back the `steps` most recently applied migrations.
    ///
    /// Returns the names rolled back, newest first.
    pub async fn down(&self, steps: usize) -> OrmResult<Vec<String>> {
        let applied = self.ledger_rows().await?;
        let steps = steps.min(applied.len());
        if steps == 0 {
            tracing::info!(target: "rowbase.migrate", core = %self.db.core(), "nothing to roll back");
            return Ok(Vec::new());
        }

        let schema = self.db.schema();
        let mut done = Vec::with_capacity(steps);
        for applied in applied.into_iter().rev().take(steps) {
            let name = applied.name;
            let migration = self.local(&name).ok_or_else(|| {
                OrmError::migration(format!("cannot roll back '{name}': not defined locally"))
            })?;
            tracing::info!(target: "rowbase.migrate", core = %self.db.core(), "rolling back {}", display_name(&name));

            if let Err(err) = migration.down(&schema).await {
                tracing::warn!(target: "rowbase.migrate", migration = %name, error = %err, "rollback failed");
                return Err(err);
            }
            self.db
                .delete(
                    "DELETE FROM ::table WHERE `name` = :name",
                    params! { "table" => self.ledger(), "name" => name.as_str() },
                )
                .await?;
            tracing::info!(target: "rowbase.migrate", core = %self.db.core(), "rolled back {}", display_name(&name));
            done.push(name);
        }
        Ok(done)
    }

    /// Drop every table, ledger included.
    pub async fn drop_all(&self) -> OrmResult<usize> {
        let dropped = self.db.schema().drop_all().await?;
        tracing::info!(target: "rowbase.migrate", core = %self.db.core(), tables = dropped, "dropped all tables");
        Ok(dropped)
    }

    /// Drop every table and migrate forward from scratch, `steps` at most.
    pub async fn fresh(&self, steps: Option<usize>) -> OrmResult<Vec<String>> {
        self.drop_all().await?;
        self.up(steps).await
    }
}
