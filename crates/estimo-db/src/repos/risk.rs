//! Risk repository.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use estimo_core::entities::Risk;
use estimo_core::enums::{EntityType, ScoringStatus};
use estimo_core::errors::CoreError;
use estimo_core::repository::RiskRepo;

use crate::error::DatabaseError;
use crate::helpers::{collect_rows, get_uuid, parse_datetime, parse_enum};
use crate::service::EstimoService;

const SELECT_COLS: &str =
    "id, epic_id, description, status, weighted_score, created_at, updated_at";

fn row_to_risk(row: &libsql::Row) -> Result<Risk, DatabaseError> {
    Ok(Risk {
        id: get_uuid(row, 0)?,
        epic_id: get_uuid(row, 1)?,
        description: row.get(2)?,
        status: parse_enum(&row.get::<String>(3)?)?,
        weighted_score: row.get::<Option<f64>>(4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

impl EstimoService {
    /// Attach a risk to an epic with the given starting status.
    pub async fn create_risk(
        &self,
        epic_id: Uuid,
        description: &str,
        status: ScoringStatus,
    ) -> Result<Risk, DatabaseError> {
        self.get_epic(epic_id).await?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO risks ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)"
                ),
                libsql::params![
                    id.to_string(),
                    epic_id.to_string(),
                    description,
                    status.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        tracing::info!(risk_id = %id, epic_id = %epic_id, "risk created");
        Ok(Risk {
            id,
            epic_id,
            description: description.to_string(),
            status,
            weighted_score: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_risk(&self, id: Uuid) -> Result<Risk, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM risks WHERE id = ?1"),
                [id.to_string()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Risk, id))?;
        row_to_risk(&row)
    }

    pub async fn list_risks(&self, epic_id: Uuid) -> Result<Vec<Risk>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM risks WHERE epic_id = ?1 ORDER BY created_at, rowid"
                ),
                [epic_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_risk).await
    }

    pub async fn list_risks_pending_for(
        &self,
        participant_id: Uuid,
        epic_id: Uuid,
    ) -> Result<Vec<Risk>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM risks r
                     WHERE r.epic_id = ?2 AND r.status = 'in_progress'
                       AND NOT EXISTS (SELECT 1 FROM risk_assessments ra
                                       WHERE ra.risk_id = r.id AND ra.participant_id = ?1)
                     ORDER BY r.created_at, r.rowid"
                ),
                [participant_id.to_string(), epic_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_risk).await
    }

    pub async fn transition_risk(
        &self,
        id: Uuid,
        to: ScoringStatus,
    ) -> Result<Risk, DatabaseError> {
        let current = self.get_risk(id).await?;
        let invalid = || DatabaseError::InvalidTransition {
            entity_type: EntityType::Risk,
            id: id.to_string(),
            from: current.status,
            to,
        };
        if !current.status.can_transition_to(to) {
            return Err(invalid());
        }

        let now = Utc::now();
        let changed = {
            let _guard = self.write_lock().await;
            self.db()
                .conn()
                .execute(
                    "UPDATE risks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                    libsql::params![
                        to.as_str(),
                        now.to_rfc3339(),
                        id.to_string(),
                        current.status.as_str()
                    ],
                )
                .await?
        };
        if changed == 0 {
            return Err(invalid());
        }
        Ok(Risk {
            status: to,
            updated_at: now,
            ..current
        })
    }

    /// Set the weighted score and mark the risk complete.
    ///
    /// Returns `false` (and writes nothing) if the risk was already complete.
    pub async fn commit_risk_completion(
        &self,
        risk_id: Uuid,
        weighted_score: f64,
    ) -> Result<bool, DatabaseError> {
        let _guard = self.write_lock().await;
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE risks SET status = 'complete', weighted_score = ?1, updated_at = ?2
                 WHERE id = ?3 AND status <> 'complete'",
                libsql::params![weighted_score, Utc::now().to_rfc3339(), risk_id.to_string()],
            )
            .await?;
        Ok(changed > 0)
    }

    pub async fn delete_risk(&self, id: Uuid) -> Result<(), DatabaseError> {
        let _guard = self.write_lock().await;
        let changed = self
            .db()
            .conn()
            .execute("DELETE FROM risks WHERE id = ?1", [id.to_string()])
            .await?;
        if changed == 0 {
            return Err(DatabaseError::not_found(EntityType::Risk, id));
        }
        tracing::info!(risk_id = %id, "risk deleted");
        Ok(())
    }
}

#[async_trait]
impl RiskRepo for EstimoService {
    async fn create_risk(
        &self,
        epic_id: Uuid,
        description: &str,
        status: ScoringStatus,
    ) -> Result<Risk, CoreError> {
        Ok(Self::create_risk(self, epic_id, description, status).await?)
    }

    async fn get_risk(&self, id: Uuid) -> Result<Risk, CoreError> {
        Ok(Self::get_risk(self, id).await?)
    }

    async fn list_risks(&self, epic_id: Uuid) -> Result<Vec<Risk>, CoreError> {
        Ok(Self::list_risks(self, epic_id).await?)
    }

    async fn list_risks_pending_for(
        &self,
        participant_id: Uuid,
        epic_id: Uuid,
    ) -> Result<Vec<Risk>, CoreError> {
        Ok(Self::list_risks_pending_for(self, participant_id, epic_id).await?)
    }

    async fn transition_risk(&self, id: Uuid, to: ScoringStatus) -> Result<Risk, CoreError> {
        Ok(Self::transition_risk(self, id, to).await?)
    }

    async fn commit_risk_completion(
        &self,
        risk_id: Uuid,
        weighted_score: f64,
    ) -> Result<bool, CoreError> {
        Ok(Self::commit_risk_completion(self, risk_id, weighted_score).await?)
    }

    async fn delete_risk(&self, id: Uuid) -> Result<(), CoreError> {
        Ok(Self::delete_risk(self, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_epic, seed_participant, seed_team, test_service};
    use estimo_core::inputs::RiskFactor;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn risks_list_in_creation_order() {
        let svc = test_service().await;
        let team = seed_team(&svc, "core", &[]).await;
        let epic = seed_epic(&svc, &team, "EP-1").await;
        for desc in ["first", "second", "third"] {
            svc.create_risk(epic.id, desc, ScoringStatus::New).await.unwrap();
        }
        let descs: Vec<String> = svc
            .list_risks(epic.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.description)
            .collect();
        assert_eq!(descs, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn risk_completion_is_status_gated() {
        let svc = test_service().await;
        let team = seed_team(&svc, "core", &[]).await;
        let epic = seed_epic(&svc, &team, "EP-1").await;
        let risk = svc
            .create_risk(epic.id, "outage", ScoringStatus::InProgress)
            .await
            .unwrap();

        assert!(svc.commit_risk_completion(risk.id, 6.5).await.unwrap());
        assert!(!svc.commit_risk_completion(risk.id, 1.0).await.unwrap());

        let stored = svc.get_risk(risk.id).await.unwrap();
        assert_eq!(stored.status, ScoringStatus::Complete);
        assert_eq!(stored.weighted_score, Some(6.5));

        let err = svc
            .transition_risk(risk.id, ScoringStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn pending_risks_exclude_assessed_ones() {
        let svc = test_service().await;
        let alice = seed_participant(&svc, "alice", 40).await;
        let team = seed_team(&svc, "core", &[&alice]).await;
        let epic = seed_epic(&svc, &team, "EP-1").await;
        let a = svc
            .create_risk(epic.id, "a", ScoringStatus::InProgress)
            .await
            .unwrap();
        let b = svc
            .create_risk(epic.id, "b", ScoringStatus::InProgress)
            .await
            .unwrap();
        svc.create_risk(epic.id, "not started", ScoringStatus::New)
            .await
            .unwrap();

        let one = RiskFactor::new(1).unwrap();
        svc.upsert_risk_assessment(a.id, alice.id, one, one)
            .await
            .unwrap();

        let pending = svc.list_risks_pending_for(alice.id, epic.id).await.unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id]);
    }
}
