//! Data source descriptors.
//!
//! Descriptors are owned by the external CRUD layer; this crate only reads
//! them to derive query fields and route execution.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// SQL dialect of the backing store. Decides quoting and row-limit syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    SqlServer,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::SqlServer => "sqlserver",
        }
    }

    /// Whether row limiting rewrites the SELECT clause with a leading `TOP n`
    /// instead of appending a trailing `LIMIT n [OFFSET m]`.
    pub fn uses_top_clause(&self) -> bool {
        matches!(self, Self::SqlServer)
    }
}

/// Semantic column type as declared by the source descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Number,
    Date,
    Boolean,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: SemanticType,
}

/// How rows are obtained for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Rows are materialized up front (uploaded CSV/Excel style sources).
    TabularFile,
    /// Queries are delegated to a live database connector.
    LiveDatabase,
}

/// Connection settings for live-database sources, passed through to the
/// connector verbatim. The password never serializes back out.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDescriptor {
    pub id: String,
    pub dialect: Dialect,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,
}

impl DataSourceDescriptor {
    /// Table reference as it appears in FROM, schema-qualified when present.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, self.table),
            _ => self.table.clone(),
        }
    }
}
