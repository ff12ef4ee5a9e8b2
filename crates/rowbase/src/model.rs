//! Model definitions: how a table maps onto entities.

use crate::error::{OrmError, OrmResult};
use crate::relation::Relationship;
use indexmap::IndexMap;

/// Column names stamped on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: String,
    pub updated_at: String,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            created_at: "createdAt".to_string(),
            updated_at: "updatedAt".to_string(),
        }
    }
}

/// Whether a definition was registered or made up for an unknown table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Registered,
    /// Table name and primary key only.
    Generic,
}

/// Definition of a model bound to one table of one database.
///
/// ```ignore
/// let post = ModelDef::new("main", "post")
///     .dates(&["publishedAt"])
///     .timestamps(true)
///     .relationship("comments", "post/id postId/comment")
///     .relationship("tags", "post/id postId(postTag)tagId id/tag");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    core: String,
    name: String,
    table: String,
    primary_key: String,
    dates: Vec<String>,
    timestamps: Option<Timestamps>,
    descriptors: Vec<(String, String)>,
    relationships: IndexMap<String, Relationship>,
    kind: ModelKind,
}

impl ModelDef {
    /// A model named `name` on database `core`; the table defaults to the name.
    pub fn new(core: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            core: core.into(),
            table: name.clone(),
            name,
            primary_key: "id".to_string(),
            dates: Vec::new(),
            timestamps: None,
            descriptors: Vec::new(),
            relationships: IndexMap::new(),
            kind: ModelKind::Registered,
        }
    }

    /// Definition used for tables nobody registered.
    pub fn generic(core: impl Into<String>, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            kind: ModelKind::Generic,
            ..Self::new(core, table)
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Columns whose text values go through date normalization on write.
    pub fn dates(mut self, columns: &[&str]) -> Self {
        self.dates = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Stamp `createdAt` / `updatedAt` on save.
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled.then(Timestamps::default);
        self
    }

    pub fn timestamp_columns(
        mut self,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        self.timestamps = Some(Timestamps {
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        });
        self
    }

    /// Declare a relationship; the descriptor is parsed by [`ModelDef::finalize`].
    pub fn relationship(mut self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.descriptors.push((name.into(), descriptor.into()));
        self
    }

    /// Parse every declared relationship against the final table name.
    pub fn finalize(mut self) -> OrmResult<Self> {
        for (name, descriptor) in std::mem::take(&mut self.descriptors) {
            let rel = Relationship::parse(&descriptor, &self.table).map_err(|e| match e {
                OrmError::Configuration(msg) => {
                    OrmError::configuration(format!("model '{}': {msg}", self.name))
                }
                other => other,
            })?;
            if self.relationships.insert(name.clone(), rel).is_some() {
                return Err(OrmError::configuration(format!(
                    "model '{}' declares relationship '{name}' twice",
                    self.name
                )));
            }
        }
        Ok(self)
    }

    pub fn core(&self) -> &str {
        &self.core
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key_column(&self) -> &str {
        &self.primary_key
    }

    pub fn date_columns(&self) -> &[String] {
        &self.dates
    }

    pub fn timestamp_policy(&self) -> Option<&Timestamps> {
        self.timestamps.as_ref()
    }

    pub fn relationships(&self) -> &IndexMap<String, Relationship> {
        &self.relationships
    }

    pub fn relation(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_generic(&self) -> bool {
        self.kind == ModelKind::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let def = ModelDef::new("main", "post");
        assert_eq!(def.table_name(), "post");
        assert_eq!(def.primary_key_column(), "id");
        assert!(def.timestamp_policy().is_none());
        assert_eq!(def.kind(), ModelKind::Registered);
    }

    #[test]
    fn timestamp_policies() {
        let def = ModelDef::new("main", "post").timestamps(true);
        assert_eq!(def.timestamp_policy(), Some(&Timestamps::default()));

        let def = ModelDef::new("main", "post").timestamp_columns("created", "modified");
        assert_eq!(def.timestamp_policy().unwrap().updated_at, "modified");
    }

    #[test]
    fn finalize_parses_against_the_final_table() {
        let def = ModelDef::new("main", "Post")
            .relationship("comments", "posts/id postId/comment")
            .table("posts")
            .finalize()
            .unwrap();
        assert!(def.relation("comments").is_some());
    }

    #[test]
    fn finalize_rejects_bad_descriptors() {
        let err = ModelDef::new("main", "post")
            .relationship("tags", "post/id nonsense")
            .finalize()
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("model 'post'"));
    }

    #[test]
    fn generic_definitions_are_tagged() {
        let def = ModelDef::generic("main", "audit_log");
        assert!(def.is_generic());
        assert_eq!(def.table_name(), "audit_log");
    }
}
