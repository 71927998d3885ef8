use std::collections::HashMap;

use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{prelude::*, profiles, user_roles};
use compass_types::{Profile, RoleSet, RoleTag};

/// Role assignments, read by the session resolver and written from the
/// admin user list.
#[derive(Clone)]
pub struct RoleRepository {
    db: DatabaseConnection,
}

impl RoleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn parse_role(raw: &str) -> Option<RoleTag> {
        match raw.parse() {
            Ok(tag) => Some(tag),
            Err(e) => {
                tracing::warn!("Skipping role row: {}", e);
                None
            }
        }
    }

    pub async fn roles_for_user(&self, user_id: Uuid) -> Result<RoleSet> {
        let roles: Vec<String> = UserRoles::find()
            .select_only()
            .column(user_roles::Column::Role)
            .filter(user_roles::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(roles.iter().filter_map(|r| Self::parse_role(r)).collect())
    }

    pub async fn add_role(&self, user_id: Uuid, role: RoleTag) -> Result<()> {
        let model = user_roles::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(user_id),
            role: sea_orm::ActiveValue::Set(role.as_str().to_string()),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
            ..Default::default()
        };
        UserRoles::insert(model).exec(&self.db).await?;
        Ok(())
    }

    /// Drop every existing row for `user_id` and leave exactly `role`.
    pub async fn replace_role(&self, user_id: Uuid, role: RoleTag) -> Result<()> {
        let txn = self.db.begin().await?;

        UserRoles::delete_many()
            .filter(user_roles::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let model = user_roles::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(user_id),
            role: sea_orm::ActiveValue::Set(role.as_str().to_string()),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
            ..Default::default()
        };
        UserRoles::insert(model).exec(&txn).await?;

        txn.commit().await?;
        tracing::info!("User {} now has role {}", user_id, role);
        Ok(())
    }

    /// Every profile, newest first, joined with its role rows.
    pub async fn list_profiles_with_roles(&self) -> Result<Vec<Profile>> {
        let profiles = Profiles::find()
            .order_by_desc(profiles::Column::CreatedAt)
            .all(&self.db)
            .await?;
        let rows = UserRoles::find().all(&self.db).await?;

        let mut by_user: HashMap<Uuid, RoleSet> = HashMap::new();
        for row in rows {
            if let Some(tag) = Self::parse_role(&row.role) {
                by_user.entry(row.user_id).or_default().insert(tag);
            }
        }

        let listed = profiles
            .into_iter()
            .map(|model| Profile {
                id: model.id,
                email: model.email,
                full_name: model.full_name,
                created_at: model.created_at.to_rfc3339(),
                roles: by_user
                    .get(&model.id)
                    .map(|set| set.iter().collect())
                    .unwrap_or_default(),
            })
            .collect();

        Ok(listed)
    }
}
