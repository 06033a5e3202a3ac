//! Strict-consistency worker (`sct` mode)
//!
//! Each worker owns two tables: `<prefix><id>` keyed by primary key and
//! `sec_index<prefix><id>` accessed through a unique secondary index. An
//! iteration picks one of them by coin flip, updates a random row on the write
//! node and immediately reads the same row back from the read node. The read
//! must observe the value just written.
//!
//! The new value always differs from the current one, so a read node that
//! serves the previous value is always detected.

use super::{Outcome, Worker};
use crate::context::RunContext;
use crate::error::{WorkerError, WorkerResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sct_core::{Connector, QueryError, RowSet, Session, TestConfig};
use tracing::{debug, warn};

/// One way of addressing a row: table, lookup column, value column.
#[derive(Debug, Clone)]
struct AccessPath {
    table: String,
    key_column: &'static str,
    value_column: &'static str,
    create: String,
}

impl AccessPath {
    fn primary(table: String) -> Self {
        let create = format!("create table {} (id bigint not null primary key, c1 bigint)", table);
        Self {
            table,
            key_column: "id",
            value_column: "c1",
            create,
        }
    }

    fn secondary(table: String) -> Self {
        let create = format!(
            "create table {} (id bigint not null primary key, name bigint, tag bigint, \
             sid bigint, unique key uk_sid (sid))",
            table
        );
        Self {
            table,
            key_column: "sid",
            value_column: "name",
            create,
        }
    }

    fn insert(&self, key: u64) -> String {
        match self.key_column {
            "id" => format!("insert into {} values({},0)", self.table, key),
            _ => format!("insert into {} values({},0,0,{})", self.table, key, key),
        }
    }

    fn select_value(&self, key: u64) -> String {
        format!(
            "select {} from {} where {} = {}",
            self.value_column, self.table, self.key_column, key
        )
    }

    fn update_value(&self, key: u64, value: u64) -> String {
        format!(
            "update {} set {} = {} where {} = {}",
            self.table, self.value_column, value, self.key_column, key
        )
    }

    fn verify_value(&self, key: u64) -> String {
        format!("/* mysqlsct test after update */ {}", self.select_value(key))
    }

    fn select_after_insert(&self, key: u64) -> String {
        format!(
            "/* mysqlsct test after insert */ select * from {} where {} = {}",
            self.table, self.key_column, key
        )
    }
}

/// What the read node returned for an updated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// The value just written
    Match,
    /// A different value
    Mismatch,
    /// No row at all
    Missing,
    /// A non-transient read error
    ReadFailed,
    /// A transient error: the read node is unavailable
    Unavailable,
}

impl Verdict {
    fn outcome(self) -> Outcome {
        match self {
            Verdict::Match => Outcome::Passed,
            Verdict::Mismatch | Verdict::Missing | Verdict::ReadFailed => Outcome::Failed,
            Verdict::Unavailable => Outcome::Inconclusive,
        }
    }
}

struct Sessions<S> {
    write: S,
    read: S,
}

/// Choose the value written by an update.
///
/// Uniform over `[0, table_size)` minus `current`; the domain is widened to
/// `{0, 1}` when `table_size` is 1 so a different value always exists.
pub fn pick_new_value<R: Rng>(rng: &mut R, table_size: u64, current: u64) -> u64 {
    let domain = table_size.max(2);
    if current >= domain {
        return rng.gen_range(0..domain);
    }
    let v = rng.gen_range(0..domain - 1);
    if v >= current {
        v + 1
    } else {
        v
    }
}

/// Worker for the strict-consistency test.
pub struct ConsistencyWorker<'a, C: Connector> {
    ctx: &'a RunContext<C>,
    thread_id: usize,
    rng: StdRng,
    paths: [AccessPath; 2],
    sessions: Option<Sessions<C::Session>>,
}

impl<'a, C: Connector> ConsistencyWorker<'a, C> {
    /// Worker `thread_id` of the run.
    pub fn new(ctx: &'a RunContext<C>, thread_id: usize) -> Self {
        let config = ctx.config();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(thread_id as u64)),
            None => StdRng::from_entropy(),
        };
        Self {
            ctx,
            thread_id,
            rng,
            paths: [
                AccessPath::primary(config.primary_table(thread_id)),
                AccessPath::secondary(config.secondary_table(thread_id)),
            ],
            sessions: None,
        }
    }

    fn config(&self) -> &'a TestConfig {
        self.ctx.config()
    }

    fn connect(&self) -> WorkerResult<Sessions<C::Session>> {
        let config = self.config();
        let connector = self.ctx.connector();
        let write = connector.connect(
            &config.connect_params(config.write_endpoint().unwrap_or_default()),
        )?;
        let read =
            connector.connect(&config.connect_params(config.read_endpoint().unwrap_or_default()))?;
        Ok(Sessions { write, read })
    }

    fn prepare_tables(&self, sessions: &mut Sessions<C::Session>) -> WorkerResult<()> {
        let table_size = self.config().table_size;
        for path in &self.paths {
            let drop = format!("drop table if exists {}", path.table);
            if let Err(e) = sessions.write.execute(&drop) {
                warn!(target: "sct::consistency", thread_id = self.thread_id, sql = %drop,
                      errno = e.code, errmsg = %e.message, "failed to drop table");
            }
            setup(&mut sessions.write, &path.create)?;

            for key in 1..=table_size {
                setup(&mut sessions.write, &path.insert(key))?;
                if self.config().select_after_insert {
                    self.check_after_insert(&mut sessions.read, path, key);
                }
            }

            self.check_row_count(&mut sessions.write, path)?;
        }
        Ok(())
    }

    /// Read a freshly inserted row back from the read node.
    fn check_after_insert(&self, read: &mut C::Session, path: &AccessPath, key: u64) {
        let query = path.select_after_insert(key);
        let found = match read.execute(&query) {
            Ok(mut rows) => rows.fetch_row().is_some(),
            Err(e) if self.config().is_transient(e.code) => return,
            Err(e) => {
                warn!(target: "sct::consistency", thread_id = self.thread_id, sql = %query,
                      errno = e.code, errmsg = %e.message, "failed to select after insert");
                false
            }
        };
        if !found {
            if self.config().detail_log {
                warn!(target: "sct::consistency", thread_id = self.thread_id, key,
                      sql = %query, "row missing on read node after insert");
            }
            self.ctx.stats().record(false);
        }
    }

    fn check_row_count(&self, write: &mut C::Session, path: &AccessPath) -> WorkerResult<()> {
        let query = format!("select count(*) from {}", path.table);
        let mut rows = setup(write, &query)?;
        let expected = self.config().table_size;
        match rows.fetch_row().and_then(|r| r.get_u64(0)) {
            Some(count) if count == expected => {}
            Some(count) => {
                warn!(target: "sct::consistency", table = %path.table, expected, count,
                      "table size check failed");
            }
            None => {
                warn!(target: "sct::consistency", table = %path.table, "table size check returned no rows");
            }
        }
        Ok(())
    }

    /// Read the current value of a random row and overwrite it.
    ///
    /// Returns `(key, old, new)`.
    fn update(
        &mut self,
        write: &mut C::Session,
        path: usize,
    ) -> WorkerResult<(u64, u64, u64)> {
        let table_size = self.config().table_size;
        let path = &self.paths[path];
        let key = self.rng.gen_range(1..=table_size);

        let query = path.select_value(key);
        let mut rows = write.execute(&query).map_err(|source| WorkerError::Update {
            statement: query.clone(),
            source,
        })?;
        let old = rows
            .fetch_row()
            .and_then(|r| r.get_u64(0))
            .ok_or_else(|| WorkerError::MissingRow {
                table: path.table.clone(),
                key,
            })?;

        let new = pick_new_value(&mut self.rng, table_size, old);
        let update = path.update_value(key, new);
        write.execute(&update).map_err(|source| WorkerError::Update {
            statement: update.clone(),
            source,
        })?;
        Ok((key, old, new))
    }

    /// Read `key` from the read node and compare with `expected`.
    fn verify(
        &self,
        read: &mut C::Session,
        path: &AccessPath,
        key: u64,
        old: u64,
        expected: u64,
    ) -> Verdict {
        let config = self.config();
        let query = path.verify_value(key);
        let mut rows = match read.execute(&query) {
            Ok(rows) => rows,
            Err(e) if config.is_transient(e.code) => {
                debug!(target: "sct::consistency", thread_id = self.thread_id, errno = e.code,
                       "read node unavailable, iteration inconclusive");
                return Verdict::Unavailable;
            }
            Err(e) => {
                warn!(target: "sct::consistency", thread_id = self.thread_id, sql = %query,
                      errno = e.code, errmsg = %e.message, "failed to test consistency");
                return Verdict::ReadFailed;
            }
        };

        match rows.fetch_row().and_then(|r| r.get_u64(0)) {
            Some(observed) if observed == expected => Verdict::Match,
            Some(observed) => {
                if config.detail_log {
                    warn!(target: "sct::consistency", thread_id = self.thread_id, key, observed,
                          expected, old, sql = %query, "consistency violation");
                }
                Verdict::Mismatch
            }
            None => {
                if config.detail_log {
                    warn!(target: "sct::consistency", thread_id = self.thread_id, key, expected,
                          sql = %query, "row missing on read node");
                }
                Verdict::Missing
            }
        }
    }
}

impl<C: Connector> Worker for ConsistencyWorker<'_, C> {
    fn prepare(&mut self) -> WorkerResult<()> {
        let mut sessions = self.connect()?;
        if !self.config().skip_prepare {
            self.prepare_tables(&mut sessions)?;
        }
        if !self.config().short_connection {
            self.sessions = Some(sessions);
        }
        Ok(())
    }

    fn run_iteration(&mut self) -> WorkerResult<Outcome> {
        let mut sessions = match self.sessions.take() {
            Some(sessions) => sessions,
            None => self.connect()?,
        };

        let stats = self.ctx.stats();
        stats.increment_total();

        let path = usize::from(self.rng.gen_bool(0.5));
        let (key, old, new) = self.update(&mut sessions.write, path)?;

        if let Some(gap) = self.config().sc_gap() {
            self.ctx.sleep_unless_quit(gap);
        }

        let verdict = self.verify(&mut sessions.read, &self.paths[path], key, old, new);
        let outcome = verdict.outcome();
        if outcome == Outcome::Failed {
            stats.increment_failed();
        }
        // Only a stale value holds the worker for the operator.
        if verdict == Verdict::Mismatch {
            if let Some(pause) = self.config().fail_pause() {
                self.ctx.sleep_unless_quit(pause);
            }
        }

        if !self.config().short_connection {
            self.sessions = Some(sessions);
        }
        Ok(outcome)
    }

    fn cleanup(&mut self) {
        self.sessions = None;
        debug!(target: "sct::consistency", thread_id = self.thread_id, "sessions closed");
    }
}

fn setup<S: Session>(session: &mut S, statement: &str) -> WorkerResult<RowSet> {
    session
        .execute(statement)
        .map_err(|source: QueryError| WorkerError::Setup {
            statement: statement.to_string(),
            source,
        })
}
