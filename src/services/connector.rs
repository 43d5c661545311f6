//! Database connector seam.
//!
//! The execution router hands a finished SQL string to whatever connector
//! the data source's dialect maps to; everything behind this trait
//! (transport, drivers, connection testing) is out of core scope.

use async_trait::async_trait;

use crate::models::{DataSourceDescriptor, Dialect, Row};

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query execution failed: {0}")]
    Execution(String),

    #[error("query timed out after {0}s")]
    Timeout(u64),

    #[error("data source {0} has no connection settings")]
    MissingConnection(String),

    #[error("dialect {} is not supported by this connector", .0.as_str())]
    UnsupportedDialect(Dialect),
}

#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Execute a finished query string against the source's live backend.
    async fn execute_query(
        &self,
        source: &DataSourceDescriptor,
        sql: &str,
    ) -> Result<QueryResult, ConnectorError>;
}
