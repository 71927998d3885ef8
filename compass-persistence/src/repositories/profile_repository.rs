use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{prelude::*, profiles};
use compass_types::Identity;

#[derive(Clone)]
pub struct ProfileRepository {
    db: DatabaseConnection,
}

impl ProfileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<profiles::Model>> {
        Ok(Profiles::find_by_id(id).one(&self.db).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<profiles::Model>> {
        let model = Profiles::find()
            .filter(profiles::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(model)
    }

    /// Create the profile row for a principal seen for the first time.
    pub async fn ensure_profile(
        &self,
        identity: &Identity,
        full_name: Option<String>,
    ) -> Result<profiles::Model> {
        if let Some(existing) = self.find_by_id(identity.user_id).await? {
            return Ok(existing);
        }

        let model = profiles::ActiveModel {
            id: sea_orm::ActiveValue::Set(identity.user_id),
            email: sea_orm::ActiveValue::Set(identity.email.clone()),
            full_name: sea_orm::ActiveValue::Set(full_name),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };
        Profiles::insert(model).exec(&self.db).await?;

        tracing::info!("Created profile for {}", identity.email);
        self.find_by_id(identity.user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};

    async fn setup_test_db() -> ProfileRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        ProfileRepository::new(db)
    }

    #[tokio::test]
    async fn test_ensure_profile_is_idempotent() {
        let repo = setup_test_db().await;
        let identity = Identity {
            user_id: Uuid::new_v4(),
            email: "artist@example.com".to_string(),
        };

        let created = repo
            .ensure_profile(&identity, Some("Artist".to_string()))
            .await
            .unwrap();
        assert_eq!(created.email, identity.email);
        assert_eq!(created.full_name.as_deref(), Some("Artist"));

        let again = repo.ensure_profile(&identity, None).await.unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(again.full_name.as_deref(), Some("Artist"));

        let by_email = repo.find_by_email(&identity.email).await.unwrap().unwrap();
        assert_eq!(by_email.id, identity.user_id);
    }
}
