//! Convenient imports for typical `rowbase` usage.
//!
//! ```ignore
//! use rowbase::prelude::*;
//! ```

pub use crate::{
    Config, Db, DbConfig, Entity, Migration, Migrator, Model, ModelDef, Orm, OrmError, OrmResult,
    Params, PivotSpec, Query, Row, Schema, Table, Value, async_trait, params, save_all,
};
