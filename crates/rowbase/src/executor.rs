//! The wire seam: turn one batched SQL string into its result sets.

use crate::config::DbConfig;
use crate::error::OrmResult;
use crate::value::{Row, decode_row};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, QueryResult, TextProtocol};

/// One result set of a multi-statement batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub affected_rows: u64,
    pub last_insert_id: Option<u64>,
}

impl ResultSet {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }

    pub fn inserted(id: u64) -> Self {
        Self {
            affected_rows: 1,
            last_insert_id: Some(id),
            ..Self::default()
        }
    }
}

/// Runs a batch of `; `-joined statements in a single round trip.
///
/// Implementations return one [`ResultSet`] per statement, in order.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, config: &DbConfig, sql: &str) -> OrmResult<Vec<ResultSet>>;
}

/// `mysql_async` executor: a fresh connection per batch, closed afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlExecutor;

impl MySqlExecutor {
    fn opts(config: &DbConfig) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.pass.clone()))
            .db_name(Some(config.name.clone()))
    }

    async fn read_sets(conn: &mut Conn, sql: &str) -> OrmResult<Vec<ResultSet>> {
        let mut result = conn.query_iter(sql).await?;
        collect_sets(&mut result).await
    }
}

/// A cursor over the result sets of one batch.
///
/// Draining a set's rows advances the cursor, after which the OK packet
/// (affected rows, insert id) belongs to the next statement.
#[async_trait]
trait SetCursor: Send {
    fn affected_rows(&self) -> u64;

    fn last_insert_id(&self) -> Option<u64>;

    async fn drain_rows(&mut self) -> OrmResult<Vec<Row>>;

    fn is_exhausted(&self) -> bool;
}

#[async_trait]
impl<'a, 't: 'a> SetCursor for QueryResult<'a, 't, TextProtocol> {
    fn affected_rows(&self) -> u64 {
        QueryResult::affected_rows(self)
    }

    fn last_insert_id(&self) -> Option<u64> {
        QueryResult::last_insert_id(self)
    }

    async fn drain_rows(&mut self) -> OrmResult<Vec<Row>> {
        let raw: Vec<mysql_async::Row> = self.collect().await?;
        raw.into_iter().map(decode_row).collect()
    }

    fn is_exhausted(&self) -> bool {
        self.is_empty()
    }
}

/// Metadata is read before the rows are drained.
async fn collect_sets(cursor: &mut impl SetCursor) -> OrmResult<Vec<ResultSet>> {
    let mut sets = Vec::new();
    loop {
        let affected_rows = cursor.affected_rows();
        let last_insert_id = cursor.last_insert_id();
        let rows = cursor.drain_rows().await?;
        sets.push(ResultSet {
            rows,
            affected_rows,
            last_insert_id,
        });
        if cursor.is_exhausted() {
            break;
        }
    }
    Ok(sets)
}

#[async_trait]
impl Executor for MySqlExecutor {
    async fn run(&self, config: &DbConfig, sql: &str) -> OrmResult<Vec<ResultSet>> {
        let mut conn = Conn::new(Self::opts(config)).await?;
        let outcome = Self::read_sets(&mut conn, sql).await;
        // Close before reporting; an open transaction is rolled back by the server.
        let closed = conn.disconnect().await;
        let sets = outcome?;
        closed?;
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mirrors the driver: metadata reports whichever set the cursor is on.
    struct ScriptedCursor {
        sets: Vec<ResultSet>,
        at: usize,
    }

    #[async_trait]
    impl SetCursor for ScriptedCursor {
        fn affected_rows(&self) -> u64 {
            self.sets.get(self.at).map_or(0, |s| s.affected_rows)
        }

        fn last_insert_id(&self) -> Option<u64> {
            self.sets.get(self.at).and_then(|s| s.last_insert_id)
        }

        async fn drain_rows(&mut self) -> OrmResult<Vec<Row>> {
            let rows = self.sets[self.at].rows.clone();
            self.at += 1;
            Ok(rows)
        }

        fn is_exhausted(&self) -> bool {
            self.at >= self.sets.len()
        }
    }

    #[tokio::test]
    async fn each_set_keeps_its_own_ok_packet() {
        let script = vec![
            ResultSet::inserted(7),
            ResultSet::with_rows(vec![Row::new().with("count(*)", 2)]),
            ResultSet::affected(3),
            ResultSet::inserted(8),
        ];
        let mut cursor = ScriptedCursor {
            sets: script.clone(),
            at: 0,
        };
        assert_eq!(collect_sets(&mut cursor).await.unwrap(), script);
    }

    #[tokio::test]
    async fn single_statement() {
        let mut cursor = ScriptedCursor {
            sets: vec![ResultSet::inserted(1)],
            at: 0,
        };
        let sets = collect_sets(&mut cursor).await.unwrap();
        assert_eq!(sets, vec![ResultSet::inserted(1)]);
    }
}
