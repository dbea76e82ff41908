//! Key/value service state

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set, sea_query::OnConflict};
use std::sync::Arc;

use crate::entities::{app_state, prelude::AppState};

pub const LAST_RUN_KEY: &str = "last_run";

#[derive(Clone)]
pub struct AppStateSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl AppStateSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, DbErr> {
        Ok(AppState::find_by_id(key.to_string())
            .one(&*self.connection)
            .await?
            .map(|model| model.value))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), DbErr> {
        let model = app_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now()),
        };
        AppState::insert(model)
            .on_conflict(
                OnConflict::column(app_state::Column::Key)
                    .update_columns([app_state::Column::Value, app_state::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Time the freshness gate last let a merge through
    pub async fn last_run(&self) -> Result<Option<DateTime<Utc>>, DbErr> {
        Ok(self
            .get(LAST_RUN_KEY)
            .await?
            .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
            .map(|ts| ts.with_timezone(&Utc)))
    }

    pub async fn set_last_run(&self, timestamp: DateTime<Utc>) -> Result<(), DbErr> {
        self.set(LAST_RUN_KEY, &timestamp.to_rfc3339()).await
    }
}
