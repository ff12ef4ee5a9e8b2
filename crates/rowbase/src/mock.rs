//! In-memory [`Executor`] for tests.
//!
//! Every batch is recorded. Queued responses are replayed first-in first-out;
//! once the queue is empty each statement gets a synthesized result: `INSERT`
//! statements receive increasing insert ids, `SELECT count(*)` returns zero and
//! everything else an empty OK result.

use crate::config::DbConfig;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, ResultSet};
use crate::value::Row;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MockState {
    batches: Vec<Batch>,
    responses: VecDeque<OrmResult<Vec<ResultSet>>>,
    next_insert_id: u64,
}

/// One recorded round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Name of the schema the batch was sent to.
    pub database: String,
    pub sql: String,
}

impl Batch {
    /// The individual statements of the batch.
    pub fn statements(&self) -> Vec<&str> {
        split_statements(&self.sql)
    }
}

/// Cloneable handle; clones share recorded batches and queued responses.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Synthesized insert ids start at `first_id`.
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_insert_id: first_id,
                ..MockState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the result sets for the next batch.
    pub fn push_response(&self, sets: Vec<ResultSet>) -> &Self {
        self.state().responses.push_back(Ok(sets));
        self
    }

    /// Queue a single-statement batch returning `rows`.
    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.push_response(vec![ResultSet::with_rows(rows)])
    }

    /// Queue a failure for the next batch.
    pub fn push_error(&self, err: OrmError) -> &Self {
        self.state().responses.push_back(Err(err));
        self
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.state().batches.clone()
    }

    /// SQL of every recorded batch, in order.
    pub fn sql(&self) -> Vec<String> {
        self.state().batches.iter().map(|b| b.sql.clone()).collect()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.state().batches.last().map(|b| b.sql.clone())
    }

    pub fn clear(&self) {
        self.state().batches.clear();
    }

    fn synthesize(state: &mut MockState, sql: &str) -> Vec<ResultSet> {
        split_statements(sql)
            .into_iter()
            .map(|statement| {
                let upper = statement.trim_start().to_ascii_uppercase();
                if upper.starts_with("INSERT") {
                    let id = state.next_insert_id;
                    state.next_insert_id += 1;
                    ResultSet::inserted(id)
                } else if upper.starts_with("SELECT COUNT(*)") {
                    ResultSet::with_rows(vec![Row::new().with("count(*)", 0)])
                } else {
                    ResultSet::default()
                }
            })
            .collect()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn run(&self, config: &DbConfig, sql: &str) -> OrmResult<Vec<ResultSet>> {
        let mut state = self.state();
        state.batches.push(Batch {
            database: config.name.clone(),
            sql: sql.to_string(),
        });
        match state.responses.pop_front() {
            Some(response) => response,
            None => Ok(Self::synthesize(&mut state, sql)),
        }
    }
}

fn split_statements(sql: &str) -> Vec<&str> {
    sql.split("; ").filter(|s| !s.trim().is_empty()).collect()
}
