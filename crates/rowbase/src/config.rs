//! Application and per-database configuration.
//!
//! ```toml
//! mode = "development"
//!
//! [databases.main]
//! host = "localhost"
//! user = "app"
//! pass = "${MAIN_DB_PASS}"
//! name = "app"
//! ```
//!
//! `${VAR}` references in string fields are expanded from the environment.

use crate::error::{OrmError, OrmResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Runtime mode of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    /// Production deploys with this set skip the interactive migrate prompt.
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default)]
    pub databases: BTreeMap<String, DbConfig>,
}

/// Connection parameters for one named database ("core").
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    pub name: String,
    /// Destructive CLI operations require `--force`.
    #[serde(default)]
    pub protected: bool,
    #[serde(default = "default_migration_table")]
    pub migration_table: String,
    /// Log every batch at `info` instead of `debug`.
    #[serde(default)]
    pub output_queries: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_migration_table() -> String {
    "migration".to_string()
}

impl DbConfig {
    /// Local defaults for the named schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: String::new(),
            pass: String::new(),
            name: name.into(),
            protected: false,
            migration_table: default_migration_table(),
            output_queries: false,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = user.into();
        self.pass = pass.into();
        self
    }

    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    pub fn migration_table(mut self, table: impl Into<String>) -> Self {
        self.migration_table = table.into();
        self
    }

    pub fn output_queries(mut self, enabled: bool) -> Self {
        self.output_queries = enabled;
        self
    }

    pub fn is_localhost(&self) -> bool {
        self.host == "localhost"
    }

    fn expand_env(&mut self) -> OrmResult<()> {
        self.host = expand_env_vars(&self.host)?;
        self.user = expand_env_vars(&self.user)?;
        self.pass = expand_env_vars(&self.pass)?;
        self.name = expand_env_vars(&self.name)?;
        self.migration_table = expand_env_vars(&self.migration_table)?;
        Ok(())
    }
}

impl Config {
    /// Read, expand and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrmError::configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            OrmError::Configuration(msg) => {
                OrmError::configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> OrmResult<Self> {
        let mut config: Config = toml::from_str(raw)
            .map_err(|e| OrmError::configuration(format!("failed to parse config: {e}")))?;
        for db in config.databases.values_mut() {
            db.expand_env()?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn database(&self, core: &str) -> OrmResult<&DbConfig> {
        self.databases
            .get(core)
            .ok_or_else(|| OrmError::configuration(format!("unknown database '{core}'")))
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }

    fn validate(&self) -> OrmResult<()> {
        for (core, db) in &self.databases {
            if core.trim().is_empty() {
                return Err(OrmError::configuration("database key must not be empty"));
            }
            if db.name.trim().is_empty() {
                return Err(OrmError::configuration(format!(
                    "databases.{core}.name must not be empty"
                )));
            }
            if db.migration_table.trim().is_empty() {
                return Err(OrmError::configuration(format!(
                    "databases.{core}.migration_table must not be empty"
                )));
            }
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> OrmResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(OrmError::configuration(format!(
                    "unterminated env var reference: ${{{key}"
                )));
            }
            if key.is_empty() {
                return Err(OrmError::configuration("invalid env var reference: ${}"));
            }

            let v = std::env::var(&key).map_err(|_| {
                OrmError::configuration(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = Config::from_toml_str(
            r#"
            [databases.main]
            name = "app"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Development);
        let db = config.database("main").unwrap();
        assert_eq!(db.host, "localhost");
        assert_eq!(db.port, 3306);
        assert_eq!(db.migration_table, "migration");
        assert!(!db.protected);
        assert!(db.is_localhost());
    }

    #[test]
    fn full_document_parses() {
        let config = Config::from_toml_str(
            r#"
            mode = "production"
            maintenance_mode = true

            [databases.main]
            host = "db.internal"
            port = 3307
            user = "app"
            pass = "secret"
            name = "app"
            protected = true
            migration_table = "schema_ledger"
            output_queries = true
            "#,
        )
        .unwrap();

        assert!(config.is_production());
        assert!(config.maintenance_mode);
        let db = config.database("main").unwrap();
        assert_eq!(db.port, 3307);
        assert!(db.protected);
        assert!(db.output_queries);
        assert_eq!(db.migration_table, "schema_ledger");
        assert!(!db.is_localhost());
    }

    #[test]
    fn env_references_expand() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("ROWBASE_TEST_DB_PASS", "hunter2") };
        let config = Config::from_toml_str(
            r#"
            [databases.main]
            name = "app"
            pass = "${ROWBASE_TEST_DB_PASS}"
            "#,
        )
        .unwrap();
        assert_eq!(config.database("main").unwrap().pass, "hunter2");
    }

    #[test]
    fn missing_env_var_is_a_configuration_error() {
        let err = Config::from_toml_str(
            r#"
            [databases.main]
            name = "${ROWBASE_TEST_SURELY_UNSET}"
            "#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_database_is_rejected() {
        let config = Config::default();
        assert!(config.database("nope").unwrap_err().is_configuration());
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [databases.main]
            name = " "
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("databases.main.name"));
    }
}
