//! Contract for the remote collaborator: a hosted auth + relational table
//! store offering row CRUD with filtering, ordering and limits, keyed by a
//! user id for tenant isolation. The application holds no durable state of
//! its own; everything below the service layer goes through these traits.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::model::Session;

mod http;
mod memory;
pub mod query;

pub use http::RestClient;
pub use memory::MemoryRemote;
pub use query::{Direction, Filter, TableQuery};

#[derive(Error, Debug)]
pub enum RemoteError {
    /// The service could not be reached at all (DNS, connect, timeout).
    #[error("remote unreachable: {0}")]
    Connectivity(String),

    /// The service answered with a failure for this operation.
    #[error("remote error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed remote payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Row-level CRUD against the remote table store. Rows travel as JSON values;
/// the service layer owns the typed views.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, query: TableQuery) -> Result<Vec<Value>, RemoteError>;

    /// Insert one row and return the stored representation (id and timestamps
    /// filled in by the remote).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError>;

    /// Patch every row matched by the query's filters; returns the updated
    /// representations (possibly empty when nothing matched).
    async fn update(&self, query: TableQuery, patch: Value) -> Result<Vec<Value>, RemoteError>;

    /// Physically delete matched rows; returns the removed representations.
    async fn delete(&self, query: TableQuery) -> Result<Vec<Value>, RemoteError>;
}

/// Session management on the remote auth endpoint.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, RemoteError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RemoteError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError>;
}
