//! Team repository: teams and their rosters.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use estimo_core::entities::Team;
use estimo_core::enums::EntityType;
use estimo_core::errors::CoreError;
use estimo_core::repository::TeamRepo;

use crate::error::DatabaseError;
use crate::helpers::{collect_rows, get_narrow, get_opt_string, get_uuid, parse_datetime};
use crate::service::EstimoService;

const SELECT_COLS: &str = "id, name, description, created_at, updated_at";

fn row_to_team(row: &libsql::Row) -> Result<Team, DatabaseError> {
    Ok(Team {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        description: get_opt_string(row, 2)?,
        created_at: parse_datetime(&row.get::<String>(3)?)?,
        updated_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

impl EstimoService {
    pub async fn create_team(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Team, DatabaseError> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                &format!("INSERT INTO teams ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                libsql::params![
                    id.to_string(),
                    name,
                    description,
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::or_conflict(e, || format!("team '{name}' already exists")))?;

        Ok(Team {
            id,
            name: name.to_string(),
            description: description.map(String::from),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_team(&self, id: Uuid) -> Result<Team, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM teams WHERE id = ?1"),
                [id.to_string()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Team, id))?;
        row_to_team(&row)
    }

    pub async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM teams WHERE name = ?1"),
                [name],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_team(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(&format!("SELECT {SELECT_COLS} FROM teams ORDER BY name"), ())
            .await?;
        collect_rows(rows, row_to_team).await
    }

    /// Add a participant to a team roster. Re-adding a member is a no-op.
    pub async fn add_team_member(
        &self,
        team_id: Uuid,
        participant_id: Uuid,
    ) -> Result<(), DatabaseError> {
        self.get_team(team_id).await?;
        self.get_participant(participant_id).await?;

        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                "INSERT OR IGNORE INTO team_members (team_id, participant_id) VALUES (?1, ?2)",
                [team_id.to_string(), participant_id.to_string()],
            )
            .await?;
        Ok(())
    }

    pub async fn remove_team_member(
        &self,
        team_id: Uuid,
        participant_id: Uuid,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                "DELETE FROM team_members WHERE team_id = ?1 AND participant_id = ?2",
                [team_id.to_string(), participant_id.to_string()],
            )
            .await?;
        Ok(())
    }

    pub async fn count_team_members(&self, team_id: Uuid) -> Result<u64, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT COUNT(*) FROM team_members WHERE team_id = ?1",
                [team_id.to_string()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        get_narrow(&row, 0)
    }

    pub async fn list_participant_teams(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<Team>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM teams
                     WHERE id IN (SELECT team_id FROM team_members WHERE participant_id = ?1)
                     ORDER BY name"
                ),
                [participant_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_team).await
    }
}

#[async_trait]
impl TeamRepo for EstimoService {
    async fn create_team(&self, name: &str, description: Option<&str>) -> Result<Team, CoreError> {
        Ok(Self::create_team(self, name, description).await?)
    }

    async fn get_team(&self, id: Uuid) -> Result<Team, CoreError> {
        Ok(Self::get_team(self, id).await?)
    }

    async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, CoreError> {
        Ok(Self::find_team_by_name(self, name).await?)
    }

    async fn list_teams(&self) -> Result<Vec<Team>, CoreError> {
        Ok(Self::list_teams(self).await?)
    }

    async fn add_team_member(&self, team_id: Uuid, participant_id: Uuid) -> Result<(), CoreError> {
        Ok(Self::add_team_member(self, team_id, participant_id).await?)
    }

    async fn remove_team_member(
        &self,
        team_id: Uuid,
        participant_id: Uuid,
    ) -> Result<(), CoreError> {
        Ok(Self::remove_team_member(self, team_id, participant_id).await?)
    }

    async fn count_team_members(&self, team_id: Uuid) -> Result<u64, CoreError> {
        Ok(Self::count_team_members(self, team_id).await?)
    }

    async fn list_participant_teams(&self, participant_id: Uuid) -> Result<Vec<Team>, CoreError> {
        Ok(Self::list_participant_teams(self, participant_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_participant, seed_team, test_service};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn membership_is_idempotent_and_counted() {
        let svc = test_service().await;
        let a = seed_participant(&svc, "a", 10).await;
        let b = seed_participant(&svc, "b", 10).await;
        let team = seed_team(&svc, "core", &[&a, &b]).await;

        svc.add_team_member(team.id, a.id).await.unwrap();
        assert_eq!(svc.count_team_members(team.id).await.unwrap(), 2);

        svc.remove_team_member(team.id, b.id).await.unwrap();
        assert_eq!(svc.count_team_members(team.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn participant_can_belong_to_several_teams() {
        let svc = test_service().await;
        let a = seed_participant(&svc, "a", 10).await;
        seed_team(&svc, "platform", &[&a]).await;
        seed_team(&svc, "billing", &[&a]).await;
        seed_team(&svc, "empty", &[]).await;

        let names: Vec<String> = svc
            .list_participant_teams(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["billing".to_string(), "platform".to_string()]);
        assert_eq!(svc.list_teams().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_team_name_conflicts() {
        let svc = test_service().await;
        svc.create_team("core", None).await.unwrap();
        let err = svc.create_team("Core", None).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
        assert!(svc.find_team_by_name("CORE").await.unwrap().is_some());
    }
}
