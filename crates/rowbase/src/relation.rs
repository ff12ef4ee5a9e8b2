//! Relationship descriptors.
//!
//! A descriptor is a whitespace-separated list of tokens, optionally led by a
//! `1` marking a singular relationship:
//!
//! ```text
//! post/id postId/comment                     post.id = comment.postId
//! 1 user/id userId/profile                   singular
//! post/id postId(postTag)tagId id/tag        post.id = postTag.postId, postTag.tagId = tag.id
//! ```
//!
//! The first token always names the declaring model's table and the column
//! holding the key the relationship starts from.

use crate::error::{OrmError, OrmResult};
use std::fmt;
use std::str::FromStr;

/// Join path of a parsed relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationPath {
    /// `target.foreign_column = owner.owner_column`
    Direct {
        owner_table: String,
        owner_column: String,
        foreign_column: String,
        target_table: String,
    },
    /// Through a junction table holding both foreign keys.
    Pivot {
        owner_table: String,
        owner_column: String,
        /// Junction column referencing the owner.
        owner_fk: String,
        pivot_table: String,
        /// Junction column referencing the target.
        target_fk: String,
        target_column: String,
        target_table: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub path: RelationPath,
    /// Resolves to at most one entity.
    pub single: bool,
}

impl Relationship {
    /// Parse a descriptor declared on a model bound to `owner_table`.
    pub fn parse(descriptor: &str, owner_table: &str) -> OrmResult<Self> {
        let rel: Relationship = descriptor.parse()?;
        if rel.owner_table() != owner_table {
            return Err(OrmError::configuration(format!(
                "relationship '{descriptor}' starts at table '{}', expected '{owner_table}'",
                rel.owner_table()
            )));
        }
        Ok(rel)
    }

    pub fn owner_table(&self) -> &str {
        match &self.path {
            RelationPath::Direct { owner_table, .. } | RelationPath::Pivot { owner_table, .. } => {
                owner_table
            }
        }
    }

    /// Column on the owner whose value anchors the relationship.
    pub fn owner_column(&self) -> &str {
        match &self.path {
            RelationPath::Direct { owner_column, .. }
            | RelationPath::Pivot { owner_column, .. } => owner_column,
        }
    }

    pub fn target_table(&self) -> &str {
        match &self.path {
            RelationPath::Direct { target_table, .. }
            | RelationPath::Pivot { target_table, .. } => target_table,
        }
    }
}

impl FromStr for Relationship {
    type Err = OrmError;

    fn from_str(descriptor: &str) -> OrmResult<Self> {
        let invalid = |why: &str| {
            OrmError::configuration(format!("invalid relationship '{descriptor}': {why}"))
        };

        let mut tokens: Vec<&str> = descriptor.split_whitespace().collect();
        let single = tokens.first() == Some(&"1");
        if single {
            tokens.remove(0);
        }

        let path = match tokens.as_slice() {
            [owner, target] => {
                let (owner_table, owner_column) = pair(owner).ok_or_else(|| invalid("expected table/column"))?;
                let (foreign_column, target_table) =
                    pair(target).ok_or_else(|| invalid("expected column/table"))?;
                RelationPath::Direct {
                    owner_table,
                    owner_column,
                    foreign_column,
                    target_table,
                }
            }
            [owner, pivot, target] => {
                let (owner_table, owner_column) = pair(owner).ok_or_else(|| invalid("expected table/column"))?;
                let (owner_fk, pivot_table, target_fk) =
                    junction(pivot).ok_or_else(|| invalid("expected ownerFk(pivotTable)targetFk"))?;
                let (target_column, target_table) =
                    pair(target).ok_or_else(|| invalid("expected column/table"))?;
                RelationPath::Pivot {
                    owner_table,
                    owner_column,
                    owner_fk,
                    pivot_table,
                    target_fk,
                    target_column,
                    target_table,
                }
            }
            _ => return Err(invalid("expected two or three tokens")),
        };

        Ok(Self { path, single })
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.single {
            f.write_str("1 ")?;
        }
        match &self.path {
            RelationPath::Direct {
                owner_table,
                owner_column,
                foreign_column,
                target_table,
            } => write!(f, "{owner_table}/{owner_column} {foreign_column}/{target_table}"),
            RelationPath::Pivot {
                owner_table,
                owner_column,
                owner_fk,
                pivot_table,
                target_fk,
                target_column,
                target_table,
            } => write!(
                f,
                "{owner_table}/{owner_column} {owner_fk}({pivot_table}){target_fk} {target_column}/{target_table}"
            ),
        }
    }
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn pair(token: &str) -> Option<(String, String)> {
    let (a, b) = token.split_once('/')?;
    (is_name(a) && is_name(b)).then(|| (a.to_string(), b.to_string()))
}

fn junction(token: &str) -> Option<(String, String, String)> {
    let (left, rest) = token.split_once('(')?;
    let (table, right) = rest.split_once(')')?;
    (is_name(left) && is_name(table) && is_name(right))
        .then(|| (left.to_string(), table.to_string(), right.to_string()))
}
