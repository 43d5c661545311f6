//! MySQL-protocol connector backed by mysql_async.
//!
//! Covers the MySql dialect (and protocol-compatible backends). Pools are
//! created lazily per data source and reused across requests.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use mysql_async::prelude::Queryable;
use mysql_async::{OptsBuilder, Pool, SslOpts};

use super::connector::{ConnectorError, DatabaseConnector, QueryResult};
use crate::models::{DataSourceDescriptor, Dialect, Row};

pub struct MySqlConnector {
    pools: DashMap<String, Pool>,
    query_timeout: Duration,
}

impl MySqlConnector {
    pub fn new(query_timeout: Duration) -> Self {
        Self { pools: DashMap::new(), query_timeout }
    }

    /// Fast path: reuse an existing pool. Slow path: build one from the
    /// descriptor's connection settings.
    fn get_pool(&self, source: &DataSourceDescriptor) -> Result<Pool, ConnectorError> {
        if let Some(pool) = self.pools.get(&source.id) {
            return Ok(pool.clone());
        }

        let conn = source
            .connection
            .as_ref()
            .ok_or_else(|| ConnectorError::MissingConnection(source.id.clone()))?;

        let opts = OptsBuilder::default()
            .ip_or_hostname(&conn.host)
            .tcp_port(conn.port)
            .user(Some(&conn.username))
            .pass(conn.password.as_deref())
            .db_name(conn.database.as_deref())
            .prefer_socket(false)
            .ssl_opts(None::<SslOpts>)
            .tcp_keepalive(Some(30_000_u32))
            .tcp_nodelay(true)
            .pool_opts(
                mysql_async::PoolOpts::default()
                    .with_constraints(
                        mysql_async::PoolConstraints::new(1, 10).ok_or_else(|| {
                            ConnectorError::Connection("invalid pool constraints".to_string())
                        })?,
                    )
                    .with_inactive_connection_ttl(Duration::from_secs(300))
                    .with_ttl_check_interval(Duration::from_secs(60)),
            );

        let pool = Pool::new(opts);
        self.pools.insert(source.id.clone(), pool.clone());
        tracing::info!(
            "Created connection pool for data source {} ({}:{})",
            source.id,
            conn.host,
            conn.port
        );
        Ok(pool)
    }
}

#[async_trait]
impl DatabaseConnector for MySqlConnector {
    async fn execute_query(
        &self,
        source: &DataSourceDescriptor,
        sql: &str,
    ) -> Result<QueryResult, ConnectorError> {
        if source.dialect != Dialect::MySql {
            return Err(ConnectorError::UnsupportedDialect(source.dialect));
        }

        let pool = self.get_pool(source)?;
        let mut conn = pool.get_conn().await.map_err(|e| {
            tracing::error!("Failed to get connection for source {}: {}", source.id, e);
            ConnectorError::Connection(e.to_string())
        })?;

        let started = std::time::Instant::now();
        let query = conn.query::<mysql_async::Row, _>(sql);
        let rows = tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| ConnectorError::Timeout(self.query_timeout.as_secs()))?
            .map_err(|e| {
                tracing::error!("Query execution failed for source {}: {}", source.id, e);
                ConnectorError::Execution(e.to_string())
            })?;

        drop(conn);

        tracing::debug!(
            "Source {} returned {} rows in {}ms",
            source.id,
            rows.len(),
            started.elapsed().as_millis()
        );

        Ok(process_query_result(rows))
    }
}

fn process_query_result(rows: Vec<mysql_async::Row>) -> QueryResult {
    let Some(first) = rows.first() else {
        return QueryResult::default();
    };

    let columns: Vec<String> = first
        .columns_ref()
        .iter()
        .map(|c| c.name_str().to_string())
        .collect();

    let result_rows: Vec<Row> = rows
        .iter()
        .map(|row| {
            let mut object = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                object.insert(name.clone(), value_to_json(&row[idx]));
            }
            object
        })
        .collect();

    let row_count = result_rows.len();
    QueryResult { columns, rows: result_rows, row_count }
}

// Numbers stay JSON numbers so downstream aggregation and charting never
// reparse strings.
fn value_to_json(value: &mysql_async::Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        mysql_async::Value::NULL => Json::Null,
        mysql_async::Value::Bytes(bytes) => Json::String(String::from_utf8_lossy(bytes).to_string()),
        mysql_async::Value::Int(i) => Json::from(*i),
        mysql_async::Value::UInt(u) => Json::from(*u),
        mysql_async::Value::Float(f) => serde_json::Number::from_f64(*f as f64)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        mysql_async::Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        mysql_async::Value::Date(year, month, day, hour, minute, second, _micro) => Json::String(
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", year, month, day, hour, minute, second),
        ),
        mysql_async::Value::Time(_neg, days, hours, minutes, seconds, _micro) => {
            let total_hours = days * 24 + (*hours as u32);
            Json::String(format!("{}:{:02}:{:02}", total_hours, minutes, seconds))
        },
    }
}
