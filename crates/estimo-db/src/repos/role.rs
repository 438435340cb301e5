//! Role repository: role catalogue and participant role assignments.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use estimo_core::entities::Role;
use estimo_core::enums::EntityType;
use estimo_core::errors::CoreError;
use estimo_core::repository::RoleRepo;

use crate::error::DatabaseError;
use crate::helpers::{collect_rows, get_opt_string, get_uuid};
use crate::service::EstimoService;

const SELECT_COLS: &str = "id, name, description";

fn row_to_role(row: &libsql::Row) -> Result<Role, DatabaseError> {
    Ok(Role {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        description: get_opt_string(row, 2)?,
    })
}

impl EstimoService {
    pub async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role, DatabaseError> {
        let id = Uuid::new_v4();
        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                "INSERT INTO roles (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                libsql::params![id.to_string(), name, description, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::or_conflict(e, || format!("role '{name}' already exists")))?;

        Ok(Role {
            id,
            name: name.to_string(),
            description: description.map(String::from),
        })
    }

    pub async fn get_role(&self, id: Uuid) -> Result<Role, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM roles WHERE id = ?1"),
                [id.to_string()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Role, id))?;
        row_to_role(&row)
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM roles WHERE name = ?1"),
                [name],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_role(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(&format!("SELECT {SELECT_COLS} FROM roles ORDER BY name"), ())
            .await?;
        collect_rows(rows, row_to_role).await
    }

    /// Assign a role. Assigning an already-held role is a no-op.
    pub async fn assign_role(&self, participant_id: Uuid, role_id: Uuid) -> Result<(), DatabaseError> {
        self.get_participant(participant_id).await?;
        self.get_role(role_id).await?;

        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                "INSERT OR IGNORE INTO participant_roles (participant_id, role_id) VALUES (?1, ?2)",
                [participant_id.to_string(), role_id.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Remove a role assignment. Removing a role that is not held is a no-op.
    pub async fn unassign_role(
        &self,
        participant_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                "DELETE FROM participant_roles WHERE participant_id = ?1 AND role_id = ?2",
                [participant_id.to_string(), role_id.to_string()],
            )
            .await?;
        Ok(())
    }

    pub async fn list_participant_roles(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<Role>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM roles
                     WHERE id IN (SELECT role_id FROM participant_roles WHERE participant_id = ?1)
                     ORDER BY name"
                ),
                [participant_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_role).await
    }
}

#[async_trait]
impl RoleRepo for EstimoService {
    async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, CoreError> {
        Ok(Self::create_role(self, name, description).await?)
    }

    async fn get_role(&self, id: Uuid) -> Result<Role, CoreError> {
        Ok(Self::get_role(self, id).await?)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, CoreError> {
        Ok(Self::find_role_by_name(self, name).await?)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, CoreError> {
        Ok(Self::list_roles(self).await?)
    }

    async fn assign_role(&self, participant_id: Uuid, role_id: Uuid) -> Result<(), CoreError> {
        Ok(Self::assign_role(self, participant_id, role_id).await?)
    }

    async fn unassign_role(&self, participant_id: Uuid, role_id: Uuid) -> Result<(), CoreError> {
        Ok(Self::unassign_role(self, participant_id, role_id).await?)
    }

    async fn list_participant_roles(&self, participant_id: Uuid) -> Result<Vec<Role>, CoreError> {
        Ok(Self::list_participant_roles(self, participant_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_participant, seed_role, test_service};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn role_names_are_unique() {
        let svc = test_service().await;
        seed_role(&svc, "dev").await;
        let err = svc.create_role("DEV", Some("again")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
        assert!(svc.find_role_by_name("Dev").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn primary_role_is_alphabetically_first() {
        let svc = test_service().await;
        let alice = seed_participant(&svc, "alice", 50).await;
        let qa = seed_role(&svc, "qa").await;
        let dev = seed_role(&svc, "dev").await;

        svc.assign_role(alice.id, qa.id).await.unwrap();
        svc.assign_role(alice.id, dev.id).await.unwrap();
        svc.assign_role(alice.id, dev.id).await.unwrap();

        let names: Vec<String> = svc
            .list_participant_roles(alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["dev".to_string(), "qa".to_string()]);

        let primary = RoleRepo::primary_role(&svc, alice.id).await.unwrap();
        assert_eq!(primary, Some(dev.clone()));

        svc.unassign_role(alice.id, dev.id).await.unwrap();
        let primary = RoleRepo::primary_role(&svc, alice.id).await.unwrap();
        assert_eq!(primary, Some(qa));
    }

    #[tokio::test]
    async fn assigning_unknown_role_is_not_found() {
        let svc = test_service().await;
        let alice = seed_participant(&svc, "alice", 50).await;
        let err = svc.assign_role(alice.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::NotFound {
                entity_type: EntityType::Role,
                ..
            }
        ));
    }
}
