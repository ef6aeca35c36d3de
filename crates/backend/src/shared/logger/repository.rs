use chrono::Utc;
use contracts::shared::logger::LogEntry;
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};

use crate::shared::data::db::get_connection;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "system_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub timestamp: String,
    pub source: String,
    pub category: String,
    pub message: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LogEntry {
    fn from(m: Model) -> Self {
        LogEntry {
            id: m.id,
            timestamp: m.timestamp,
            source: m.source,
            category: m.category,
            message: m.message,
        }
    }
}

/// Добавить запись в лог в фоне (без ожидания результата)
pub fn log_event_internal(source: &str, category: &str, message: &str) {
    let source = source.to_string();
    let category = category.to_string();
    let message = message.to_string();

    tokio::spawn(async move {
        if let Err(e) = log_event(get_connection(), &source, &category, &message).await {
            tracing::warn!("Failed to write system log entry: {}", e);
        }
    });
}

/// Добавить запись в лог
pub async fn log_event(
    conn: &DatabaseConnection,
    source: &str,
    category: &str,
    message: &str,
) -> anyhow::Result<()> {
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();

    let active = ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        timestamp: Set(now),
        source: Set(source.to_string()),
        category: Set(category.to_string()),
        message: Set(message.to_string()),
    };

    active.insert(conn).await?;
    Ok(())
}

/// Последние записи лога, новые сверху; опционально по категории
pub async fn list_recent(
    conn: &DatabaseConnection,
    category: Option<&str>,
    limit: u64,
) -> anyhow::Result<Vec<LogEntry>> {
    let mut query = Entity::find().order_by_desc(Column::Id);
    if let Some(category) = category {
        query = query.filter(Column::Category.eq(category));
    }
    let logs: Vec<LogEntry> = query
        .limit(limit)
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::db::{bootstrap_schema, connect};

    #[tokio::test]
    async fn test_list_recent_filters_by_category() {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(dir.path().join("log.db").to_str().unwrap())
            .await
            .unwrap();
        bootstrap_schema(&conn).await.unwrap();

        log_event(&conn, "server", "startup", "started").await.unwrap();
        log_event(&conn, "server", "onboarding_override", "first")
            .await
            .unwrap();
        log_event(&conn, "server", "onboarding_override", "second")
            .await
            .unwrap();

        let overrides = list_recent(&conn, Some("onboarding_override"), 10)
            .await
            .unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].message, "second");

        let all = list_recent(&conn, None, 2).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
