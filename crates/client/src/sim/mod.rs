//! Simulated primary/replica topology
//!
//! `SimCluster` holds two in-memory catalogs, one per node role, joined by an
//! asynchronous replication log. Every successful write on the primary is
//! appended to the log; the replica applies log entries in order but keeps the
//! newest `lag` entries pending. With `lag = 0` the replica is perfectly
//! consistent; with `lag = 1` every read-after-write on the replica observes
//! the value from before the most recent write.
//!
//! Faults can be injected at run time:
//! - [`SimCluster::fail_replica_reads`]: every replica statement fails with a
//!   chosen error code (e.g. 2013, lost connection)
//! - [`SimCluster::set_reachable`]: a node refuses connections and open
//!   sessions fail with 2013
//! - [`SimCluster::set_statement_latency`]: every statement takes at least the
//!   given time
//!
//! The cluster is its own [`Connector`]; clones share the same state.

mod catalog;
pub mod sql;

use catalog::Catalog;
use parking_lot::{Mutex, RwLock};
use sct_core::codes::{CR_CONN_HOST_ERROR, CR_SERVER_LOST, ER_OPTION_PREVENTS_STATEMENT};
use sct_core::{
    ConnectError, ConnectParams, Connector, Endpoint, QueryError, RowSet, Session, TestConfig,
};
use sql::{Cell, Statement};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Role of a simulated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Accepts reads and writes
    Primary,
    /// Read-only, fed by the replication log
    Replica,
}

#[derive(Debug, Clone, Copy)]
struct NodeState {
    role: NodeRole,
    reachable: bool,
}

#[derive(Debug, Default)]
struct Topology {
    primary: Catalog,
    replica: Catalog,
    pending: VecDeque<Statement>,
    lag: usize,
}

impl Topology {
    fn catalog(&self, role: NodeRole) -> &Catalog {
        match role {
            NodeRole::Primary => &self.primary,
            NodeRole::Replica => &self.replica,
        }
    }

    fn replicate(&mut self) {
        while self.pending.len() > self.lag {
            if let Some(stmt) = self.pending.pop_front() {
                // The replica replays what the primary accepted; a replay error
                // would mean divergence, which the harness is there to detect.
                if let Err(e) = self.replica.execute(&stmt) {
                    debug!(target: "sct::sim", error = %e, "replica replay failed");
                }
            }
        }
    }
}

#[derive(Debug)]
struct Inner {
    topology: Mutex<Topology>,
    nodes: RwLock<HashMap<Endpoint, NodeState>>,
    replica_read_error: AtomicU32,
    statement_latency_us: AtomicU64,
    connections_opened: AtomicU64,
    statements_executed: AtomicU64,
}

/// Shared handle to a simulated topology.
#[derive(Debug, Clone)]
pub struct SimCluster {
    inner: Arc<Inner>,
}

impl Default for SimCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCluster {
    /// Empty, perfectly consistent cluster with no registered nodes.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                topology: Mutex::new(Topology::default()),
                nodes: RwLock::new(HashMap::new()),
                replica_read_error: AtomicU32::new(0),
                statement_latency_us: AtomicU64::new(0),
                connections_opened: AtomicU64::new(0),
                statements_executed: AtomicU64::new(0),
            }),
        }
    }

    /// Cluster whose nodes are the endpoints named in `config`.
    ///
    /// The write node and the single endpoint map to the primary, the read node
    /// to the replica. If two roles share one endpoint the replica wins.
    pub fn for_config(config: &TestConfig) -> Self {
        let cluster = Self::new();
        for endpoint in [config.write_endpoint(), config.single_endpoint()]
            .into_iter()
            .flatten()
        {
            cluster.add_node(endpoint, NodeRole::Primary);
        }
        if let Some(endpoint) = config.read_endpoint() {
            cluster.add_node(endpoint, NodeRole::Replica);
        }
        cluster
    }

    /// Register `endpoint` as a node with `role`.
    pub fn add_node(&self, endpoint: Endpoint, role: NodeRole) -> &Self {
        self.inner.nodes.write().insert(
            endpoint,
            NodeState {
                role,
                reachable: true,
            },
        );
        self
    }

    /// Make a node accept or refuse traffic.
    pub fn set_reachable(&self, endpoint: &Endpoint, reachable: bool) {
        if let Some(node) = self.inner.nodes.write().get_mut(endpoint) {
            node.reachable = reachable;
        }
    }

    /// Number of most recent writes the replica has not applied yet.
    pub fn set_replica_lag(&self, writes: usize) {
        let mut topo = self.inner.topology.lock();
        topo.lag = writes;
        topo.replicate();
    }

    /// Apply every pending write to the replica, keeping the configured lag
    /// for future writes.
    pub fn sync_replica(&self) {
        let mut topo = self.inner.topology.lock();
        while let Some(stmt) = topo.pending.pop_front() {
            if let Err(e) = topo.replica.execute(&stmt) {
                debug!(target: "sct::sim", error = %e, "replica replay failed");
            }
        }
    }

    /// Writes waiting in the replication log.
    pub fn pending_writes(&self) -> usize {
        self.inner.topology.lock().pending.len()
    }

    /// Fail every replica statement with `code`, or stop failing with `None`.
    pub fn fail_replica_reads(&self, code: Option<u32>) {
        self.inner
            .replica_read_error
            .store(code.unwrap_or(0), Ordering::Release);
    }

    /// Minimum time every statement takes.
    pub fn set_statement_latency(&self, latency: Duration) {
        self.inner
            .statement_latency_us
            .store(latency.as_micros() as u64, Ordering::Release);
    }

    /// Sessions opened so far.
    pub fn connections_opened(&self) -> u64 {
        self.inner.connections_opened.load(Ordering::Acquire)
    }

    /// Statements that reached a node so far.
    pub fn statements_executed(&self) -> u64 {
        self.inner.statements_executed.load(Ordering::Acquire)
    }

    /// Rows in `table` on the node with `role`.
    pub fn row_count(&self, role: NodeRole, table: &str) -> Option<usize> {
        self.inner.topology.lock().catalog(role).row_count(table)
    }

    /// Integer value of `column` where `key_column = key`, on the node with `role`.
    pub fn value(
        &self,
        role: NodeRole,
        table: &str,
        key_column: &str,
        key: u64,
        column: &str,
    ) -> Option<u64> {
        let topo = self.inner.topology.lock();
        match topo.catalog(role).lookup(table, key_column, key, column)? {
            Cell::Int(v) => Some(v),
            Cell::Text(s) => s.parse().ok(),
            Cell::Null => None,
        }
    }

    fn node(&self, endpoint: &Endpoint) -> Option<NodeState> {
        self.inner.nodes.read().get(endpoint).copied()
    }
}

impl Connector for SimCluster {
    type Session = SimSession;

    fn connect(&self, params: &ConnectParams) -> Result<SimSession, ConnectError> {
        let endpoint = &params.endpoint;
        match self.node(endpoint) {
            Some(node) if node.reachable => {
                self.inner.connections_opened.fetch_add(1, Ordering::AcqRel);
                Ok(SimSession {
                    cluster: self.clone(),
                    endpoint: endpoint.clone(),
                    role: node.role,
                })
            }
            _ => Err(ConnectError::new(
                endpoint.clone(),
                CR_CONN_HOST_ERROR,
                format!("Can't connect to MySQL server on '{}'", endpoint),
            )),
        }
    }
}

/// Session on one simulated node.
#[derive(Debug)]
pub struct SimSession {
    cluster: SimCluster,
    endpoint: Endpoint,
    role: NodeRole,
}

impl SimSession {
    /// Role of the node this session is bound to.
    pub fn role(&self) -> NodeRole {
        self.role
    }
}

impl Session for SimSession {
    fn execute(&mut self, statement: &str) -> Result<RowSet, QueryError> {
        let inner = &self.cluster.inner;
        let reachable = self
            .cluster
            .node(&self.endpoint)
            .map(|n| n.reachable)
            .unwrap_or(false);
        if !reachable {
            return Err(QueryError::new(
                CR_SERVER_LOST,
                "Lost connection to MySQL server during query",
            ));
        }

        let latency = inner.statement_latency_us.load(Ordering::Acquire);
        if latency > 0 {
            std::thread::sleep(Duration::from_micros(latency));
        }
        inner.statements_executed.fetch_add(1, Ordering::AcqRel);

        if self.role == NodeRole::Replica {
            let code = inner.replica_read_error.load(Ordering::Acquire);
            if code != 0 {
                return Err(QueryError::new(code, "injected replica failure"));
            }
        }

        let stmt = sql::parse(statement)?;
        let mut topo = inner.topology.lock();
        if !stmt.is_write() {
            return topo.catalog(self.role).query(&stmt);
        }
        if self.role == NodeRole::Replica {
            return Err(QueryError::new(
                ER_OPTION_PREVENTS_STATEMENT,
                "The MySQL server is running with the --read-only option so it cannot execute this statement",
            ));
        }
        let result = topo.primary.execute(&stmt)?;
        topo.pending.push_back(stmt);
        topo.replicate();
        Ok(result)
    }
}
