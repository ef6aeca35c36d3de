use axum::{
    extract::{Json, Query},
    http::StatusCode,
};
use contracts::shared::logger::LogEntry;
use serde::Deserialize;

use crate::shared::data::db::get_connection;
use crate::shared::logger::repository;

const DEFAULT_LIMIT: u64 = 200;
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub category: Option<String>,
    pub limit: Option<u64>,
}

/// GET /api/logs (admin)
pub async fn list(Query(query): Query<LogsQuery>) -> Result<Json<Vec<LogEntry>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    repository::list_recent(get_connection(), query.category.as_deref(), limit)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to read system log: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
