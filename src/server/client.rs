use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row};
use tracing::info;

use crate::sql::{BuildResult, DefinitionStore, StoreError, StoredDefinition};

use super::api::ReportResponse;
use super::config::ServerOptions;

pub async fn connect_pool(options: &ServerOptions) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(Duration::from_secs(options.acquire_timeout_seconds))
        .connect(&options.database_url)
        .await?;

    info!(
        max_connections = options.max_connections,
        "warehouse connection pool ready"
    );

    Ok(pool)
}

/// Config-store reader backed by the warehouse itself. Soft-deleted and
/// inactive definitions are invisible here by construction.
pub struct PgDefinitionStore {
    pool: PgPool,
}

impl PgDefinitionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DefinitionStore for PgDefinitionStore {
    async fn load(&self, query_id: &str) -> Result<Option<StoredDefinition>, StoreError> {
        // one read per build; the pool owns checkout and return of the connection
        let row = sqlx::query_as::<_, (serde_json::Value, bool)>(
            "SELECT definition, wrap_json FROM report_config.query_definition \
             WHERE query_id = $1 AND is_active AND deleted_at IS NULL",
        )
        .bind(query_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Read(err.to_string()),
        })?;

        Ok(row.map(|(definition, wrap_json)| StoredDefinition {
            definition,
            wrap_json,
        }))
    }
}

/// Execute a built statement. In wrap mode the statement yields exactly one
/// row whose single column is the full result set as a JSON array; unwrapped
/// statements are decoded column by column.
pub async fn execute_report_query(
    pool: &PgPool,
    build: &BuildResult,
) -> Result<ReportResponse, sqlx::Error> {
    if build.wrap_json {
        let cell: serde_json::Value = sqlx::query_scalar(&build.sql).fetch_one(pool).await?;
        let rows = match cell {
            serde_json::Value::Array(rows) => rows,
            other => vec![other],
        };
        Ok(ReportResponse {
            row_count: rows.len(),
            rows,
        })
    } else {
        let rows = sqlx::query(&build.sql).fetch_all(pool).await?;
        let rows: Vec<serde_json::Value> = rows.iter().map(row_to_object).collect();
        Ok(ReportResponse {
            row_count: rows.len(),
            rows,
        })
    }
}

fn row_to_object(row: &PgRow) -> serde_json::Value {
    let mut object = serde_json::Map::new();

    for (i, column) in row.columns().iter().enumerate() {
        let value: serde_json::Value = if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<i32>, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(i) {
            json!(v.map(|d| d.to_string()))
        } else if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(i) {
            json!(v.map(|d| d.to_string()))
        } else if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(i) {
            json!(v.map(|d| d.to_rfc3339()))
        } else if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(i) {
            v.unwrap_or(serde_json::Value::Null)
        } else {
            serde_json::Value::Null
        };

        object.insert(column.name().to_owned(), value);
    }

    serde_json::Value::Object(object)
}

pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
