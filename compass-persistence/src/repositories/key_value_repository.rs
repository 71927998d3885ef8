use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entities::{key_value, prelude::*};

/// Durable string key-value pairs, e.g. the Color Compass high score.
#[derive(Clone)]
pub struct KeyValueRepository {
    db: DatabaseConnection,
}

impl KeyValueRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let model = KeyValue::find_by_id(key.to_string()).one(&self.db).await?;
        Ok(model.map(|m| m.value))
    }

    /// Insert or overwrite; the last write wins.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let model = key_value::ActiveModel {
            key: sea_orm::ActiveValue::Set(key.to_string()),
            value: sea_orm::ActiveValue::Set(value.to_string()),
            updated_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };

        KeyValue::insert(model)
            .on_conflict(
                OnConflict::column(key_value::Column::Key)
                    .update_columns([key_value::Column::Value, key_value::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
