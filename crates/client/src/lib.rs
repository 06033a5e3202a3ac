//! Session backends for mysqlsct
//!
//! - `sim`: an in-memory primary/replica pair with configurable replication
//!   lag and fault injection, used for dry runs and tests
//! - `mysql` (feature `mysql`): sessions over the MySQL client protocol
//!
//! Both implement the [`sct_core::Connector`] and [`sct_core::Session`]
//! traits, so the engine never knows which one it drives.

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(feature = "mysql")]
pub mod mysql;
pub mod sim;

#[cfg(feature = "mysql")]
pub use crate::mysql::{MysqlConnector, MysqlSession};
pub use sim::{NodeRole, SimCluster, SimSession};
