//! Participant repository: CRUD, rename, and weight changes.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use estimo_core::entities::{NewParticipant, Participant};
use estimo_core::enums::EntityType;
use estimo_core::errors::CoreError;
use estimo_core::inputs::Weight;
use estimo_core::repository::ParticipantRepo;

use crate::error::DatabaseError;
use crate::helpers::{checked, collect_rows, get_narrow, get_uuid, parse_datetime};
use crate::service::EstimoService;

const SELECT_COLS: &str = "id, handle, first_name, last_name, weight, created_at, updated_at";

fn row_to_participant(row: &libsql::Row) -> Result<Participant, DatabaseError> {
    Ok(Participant {
        id: get_uuid(row, 0)?,
        handle: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        weight: checked(Weight::new(get_narrow(row, 4)?))?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

impl EstimoService {
    pub async fn create_participant(
        &self,
        new: NewParticipant,
    ) -> Result<Participant, DatabaseError> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                &format!("INSERT INTO participants ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                libsql::params![
                    id.to_string(),
                    new.handle.as_str(),
                    new.first_name.as_str(),
                    new.last_name.as_str(),
                    i64::from(new.weight.get()),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| {
                DatabaseError::or_conflict(e, || {
                    format!("participant @{} already exists", new.handle)
                })
            })?;

        Ok(Participant {
            id,
            handle: new.handle,
            first_name: new.first_name,
            last_name: new.last_name,
            weight: new.weight,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_participant(&self, id: Uuid) -> Result<Participant, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM participants WHERE id = ?1"),
                [id.to_string()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Participant, id))?;
        row_to_participant(&row)
    }

    /// Case-insensitive lookup by transport handle.
    pub async fn find_participant_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Participant>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM participants WHERE handle = ?1"),
                [handle],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_participant(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_participants(&self) -> Result<Vec<Participant>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM participants ORDER BY last_name, first_name, handle"
                ),
                (),
            )
            .await?;
        collect_rows(rows, row_to_participant).await
    }

    pub async fn list_team_participants(
        &self,
        team_id: Uuid,
    ) -> Result<Vec<Participant>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM participants
                     WHERE id IN (SELECT participant_id FROM team_members WHERE team_id = ?1)
                     ORDER BY last_name, first_name, handle"
                ),
                [team_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_participant).await
    }

    pub async fn update_participant_weight(
        &self,
        id: Uuid,
        weight: Weight,
    ) -> Result<Participant, DatabaseError> {
        let changed = {
            let _guard = self.write_lock().await;
            self.db()
                .conn()
                .execute(
                    "UPDATE participants SET weight = ?1, updated_at = ?2 WHERE id = ?3",
                    libsql::params![
                        i64::from(weight.get()),
                        Utc::now().to_rfc3339(),
                        id.to_string()
                    ],
                )
                .await?
        };
        if changed == 0 {
            return Err(DatabaseError::not_found(EntityType::Participant, id));
        }
        self.get_participant(id).await
    }

    pub async fn rename_participant(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Participant, DatabaseError> {
        let changed = {
            let _guard = self.write_lock().await;
            self.db()
                .conn()
                .execute(
                    "UPDATE participants SET first_name = ?1, last_name = ?2, updated_at = ?3
                     WHERE id = ?4",
                    libsql::params![first_name, last_name, Utc::now().to_rfc3339(), id.to_string()],
                )
                .await?
        };
        if changed == 0 {
            return Err(DatabaseError::not_found(EntityType::Participant, id));
        }
        self.get_participant(id).await
    }

    /// Delete a participant together with their roles and memberships.
    ///
    /// Refused with `Conflict` once they have assessed anything, so completed
    /// epics keep every row their scores were computed from.
    pub async fn delete_participant(&self, id: Uuid) -> Result<(), DatabaseError> {
        let _guard = self.write_lock().await;
        let changed = self
            .db()
            .conn()
            .execute("DELETE FROM participants WHERE id = ?1", [id.to_string()])
            .await
            .map_err(|e| {
                DatabaseError::or_conflict(e, || {
                    "participants with recorded assessments cannot be deleted".to_string()
                })
            })?;
        if changed == 0 {
            return Err(DatabaseError::not_found(EntityType::Participant, id));
        }
        tracing::info!(participant_id = %id, "participant deleted");
        Ok(())
    }
}

#[async_trait]
impl ParticipantRepo for EstimoService {
    async fn create_participant(&self, new: NewParticipant) -> Result<Participant, CoreError> {
        Ok(Self::create_participant(self, new).await?)
    }

    async fn get_participant(&self, id: Uuid) -> Result<Participant, CoreError> {
        Ok(Self::get_participant(self, id).await?)
    }

    async fn find_participant_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Participant>, CoreError> {
        Ok(Self::find_participant_by_handle(self, handle).await?)
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, CoreError> {
        Ok(Self::list_participants(self).await?)
    }

    async fn list_team_participants(&self, team_id: Uuid) -> Result<Vec<Participant>, CoreError> {
        Ok(Self::list_team_participants(self, team_id).await?)
    }

    async fn update_participant_weight(
        &self,
        id: Uuid,
        weight: Weight,
    ) -> Result<Participant, CoreError> {
        Ok(Self::update_participant_weight(self, id, weight).await?)
    }

    async fn rename_participant(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Participant, CoreError> {
        Ok(Self::rename_participant(self, id, first_name, last_name).await?)
    }

    async fn delete_participant(&self, id: Uuid) -> Result<(), CoreError> {
        Ok(Self::delete_participant(self, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_epic, seed_participant, seed_role, seed_team, test_service};
    use estimo_core::inputs::EffortValue;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn create_participant_roundtrip() {
        let svc = test_service().await;
        let alice = seed_participant(&svc, "alice", 70).await;

        let fetched = svc.get_participant(alice.id).await.unwrap();
        assert_eq!(fetched, alice);
        assert_eq!(fetched.display_name(), "alice Tester");
    }

    #[tokio::test]
    async fn handles_are_unique_ignoring_case() {
        let svc = test_service().await;
        seed_participant(&svc, "alice", 70).await;

        let err = svc
            .create_participant(NewParticipant {
                handle: "ALICE".into(),
                first_name: "A".into(),
                last_name: "B".into(),
                weight: Weight::new(10).unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));

        let found = svc.find_participant_by_handle("Alice").await.unwrap();
        assert!(found.is_some());
        assert!(svc.find_participant_by_handle("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_missing_participant_is_not_found() {
        let svc = test_service().await;
        let err = svc.get_participant(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::NotFound {
                entity_type: EntityType::Participant,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn weight_and_name_updates() {
        let svc = test_service().await;
        let bob = seed_participant(&svc, "bob", 50).await;

        let updated = svc
            .update_participant_weight(bob.id, Weight::new(90).unwrap())
            .await
            .unwrap();
        assert_eq!(updated.weight.get(), 90);

        let renamed = svc.rename_participant(bob.id, "Robert", "Paulson").await.unwrap();
        assert_eq!(renamed.display_name(), "Robert Paulson");
        assert_eq!(renamed.weight.get(), 90);
    }

    #[tokio::test]
    async fn team_roster_lists_members_only() {
        let svc = test_service().await;
        let a = seed_participant(&svc, "a", 10).await;
        let b = seed_participant(&svc, "b", 20).await;
        seed_participant(&svc, "c", 30).await;
        let team = seed_team(&svc, "core", &[&a, &b]).await;

        let roster = svc.list_team_participants(team.id).await.unwrap();
        let handles: Vec<&str> = roster.iter().map(|p| p.handle.as_str()).collect();
        assert_eq!(handles, vec!["a", "b"]);
        assert_eq!(svc.list_participants().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_participant_cascades_membership() {
        let svc = test_service().await;
        let a = seed_participant(&svc, "a", 10).await;
        let team = seed_team(&svc, "core", &[&a]).await;

        svc.delete_participant(a.id).await.unwrap();
        assert_eq!(svc.count_team_members(team.id).await.unwrap(), 0);
        assert!(svc.delete_participant(a.id).await.is_err());
    }

    #[tokio::test]
    async fn delete_participant_refused_while_assessments_exist() {
        let svc = test_service().await;
        let a = seed_participant(&svc, "a", 10).await;
        let b = seed_participant(&svc, "b", 20).await;
        let dev = seed_role(&svc, "dev").await;
        let team = seed_team(&svc, "core", &[&a, &b]).await;
        let epic = seed_epic(&svc, &team, "EP-1").await;
        svc.upsert_effort(epic.id, a.id, dev.id, EffortValue::new(8).unwrap())
            .await
            .unwrap();

        let err = svc.delete_participant(a.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)), "unexpected error: {err}");
        assert_eq!(svc.list_effort_assessments(epic.id).await.unwrap().len(), 1);
        assert_eq!(svc.count_team_members(team.id).await.unwrap(), 2);

        // Someone who never assessed anything can still go.
        svc.delete_participant(b.id).await.unwrap();
        assert_eq!(svc.count_team_members(team.id).await.unwrap(), 1);
    }
}
