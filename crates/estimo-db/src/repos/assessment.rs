//! Assessment repository: effort estimates and risk assessments.
//!
//! Both tables are keyed by (target, participant); submitting again
//! overwrites the earlier row in place.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use estimo_core::entities::{EffortAssessment, RiskAssessment};
use estimo_core::errors::CoreError;
use estimo_core::inputs::{EffortValue, RiskFactor};
use estimo_core::repository::AssessmentRepo;

use crate::error::DatabaseError;
use crate::helpers::{checked, collect_rows, get_narrow, get_uuid, parse_datetime};
use crate::service::EstimoService;

const EFFORT_COLS: &str = "id, epic_id, participant_id, role_id, value, created_at, updated_at";

const RISK_COLS: &str =
    "id, risk_id, participant_id, probability, impact, created_at, updated_at";

fn row_to_effort(row: &libsql::Row) -> Result<EffortAssessment, DatabaseError> {
    Ok(EffortAssessment {
        id: get_uuid(row, 0)?,
        epic_id: get_uuid(row, 1)?,
        participant_id: get_uuid(row, 2)?,
        role_id: get_uuid(row, 3)?,
        value: checked(EffortValue::new(get_narrow(row, 4)?))?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

fn row_to_risk_assessment(row: &libsql::Row) -> Result<RiskAssessment, DatabaseError> {
    Ok(RiskAssessment {
        id: get_uuid(row, 0)?,
        risk_id: get_uuid(row, 1)?,
        participant_id: get_uuid(row, 2)?,
        probability: checked(RiskFactor::new(get_narrow(row, 3)?))?,
        impact: checked(RiskFactor::new(get_narrow(row, 4)?))?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

impl EstimoService {
    pub async fn upsert_effort(
        &self,
        epic_id: Uuid,
        participant_id: Uuid,
        role_id: Uuid,
        value: EffortValue,
    ) -> Result<EffortAssessment, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        {
            let _guard = self.write_lock().await;
            self.db()
                .conn()
                .execute(
                    &format!(
                        "INSERT INTO effort_assessments ({EFFORT_COLS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                         ON CONFLICT(epic_id, participant_id) DO UPDATE SET
                             role_id = excluded.role_id,
                             value = excluded.value,
                             updated_at = excluded.updated_at"
                    ),
                    libsql::params![
                        Uuid::new_v4().to_string(),
                        epic_id.to_string(),
                        participant_id.to_string(),
                        role_id.to_string(),
                        i64::from(value.get()),
                        now
                    ],
                )
                .await
                .map_err(|e| {
                    DatabaseError::or_conflict(e, || {
                        "effort assessment references a missing epic, participant, or role".into()
                    })
                })?;
        }

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {EFFORT_COLS} FROM effort_assessments
                     WHERE epic_id = ?1 AND participant_id = ?2"
                ),
                [epic_id.to_string(), participant_id.to_string()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_effort(&row)
    }

    pub async fn upsert_risk_assessment(
        &self,
        risk_id: Uuid,
        participant_id: Uuid,
        probability: RiskFactor,
        impact: RiskFactor,
    ) -> Result<RiskAssessment, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        {
            let _guard = self.write_lock().await;
            self.db()
                .conn()
                .execute(
                    &format!(
                        "INSERT INTO risk_assessments ({RISK_COLS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                         ON CONFLICT(risk_id, participant_id) DO UPDATE SET
                             probability = excluded.probability,
                             impact = excluded.impact,
                             updated_at = excluded.updated_at"
                    ),
                    libsql::params![
                        Uuid::new_v4().to_string(),
                        risk_id.to_string(),
                        participant_id.to_string(),
                        i64::from(probability.get()),
                        i64::from(impact.get()),
                        now
                    ],
                )
                .await
                .map_err(|e| {
                    DatabaseError::or_conflict(e, || {
                        "risk assessment references a missing risk or participant".into()
                    })
                })?;
        }

        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {RISK_COLS} FROM risk_assessments
                     WHERE risk_id = ?1 AND participant_id = ?2"
                ),
                [risk_id.to_string(), participant_id.to_string()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_risk_assessment(&row)
    }

    pub async fn list_effort_assessments(
        &self,
        epic_id: Uuid,
    ) -> Result<Vec<EffortAssessment>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {EFFORT_COLS} FROM effort_assessments
                     WHERE epic_id = ?1 ORDER BY created_at, rowid"
                ),
                [epic_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_effort).await
    }

    pub async fn list_role_effort_assessments(
        &self,
        epic_id: Uuid,
        role_id: Uuid,
    ) -> Result<Vec<EffortAssessment>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {EFFORT_COLS} FROM effort_assessments
                     WHERE epic_id = ?1 AND role_id = ?2 ORDER BY created_at, rowid"
                ),
                [epic_id.to_string(), role_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_effort).await
    }

    pub async fn list_risk_assessments(
        &self,
        risk_id: Uuid,
    ) -> Result<Vec<RiskAssessment>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {RISK_COLS} FROM risk_assessments
                     WHERE risk_id = ?1 ORDER BY created_at, rowid"
                ),
                [risk_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_risk_assessment).await
    }

    pub async fn count_effort_submitters(&self, epic_id: Uuid) -> Result<u64, DatabaseError> {
        self.count_distinct(
            "SELECT COUNT(DISTINCT participant_id) FROM effort_assessments WHERE epic_id = ?1",
            epic_id,
        )
        .await
    }

    pub async fn count_risk_submitters(&self, risk_id: Uuid) -> Result<u64, DatabaseError> {
        self.count_distinct(
            "SELECT COUNT(DISTINCT participant_id) FROM risk_assessments WHERE risk_id = ?1",
            risk_id,
        )
        .await
    }

    pub async fn list_effort_roles(&self, epic_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                "SELECT DISTINCT a.role_id FROM effort_assessments a
                 JOIN roles r ON r.id = a.role_id
                 WHERE a.epic_id = ?1 ORDER BY r.name",
                [epic_id.to_string()],
            )
            .await?;
        collect_rows(rows, |row| get_uuid(row, 0)).await
    }

    pub async fn has_effort_assessment(
        &self,
        epic_id: Uuid,
        participant_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT 1 FROM effort_assessments WHERE epic_id = ?1 AND participant_id = ?2",
                [epic_id.to_string(), participant_id.to_string()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn count_distinct(&self, sql: &str, target: Uuid) -> Result<u64, DatabaseError> {
        let mut rows = self.db().conn().query(sql, [target.to_string()]).await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        get_narrow(&row, 0)
    }
}

#[async_trait]
impl AssessmentRepo for EstimoService {
    async fn upsert_effort(
        &self,
        epic_id: Uuid,
        participant_id: Uuid,
        role_id: Uuid,
        value: EffortValue,
    ) -> Result<EffortAssessment, CoreError> {
        Ok(Self::upsert_effort(self, epic_id, participant_id, role_id, value).await?)
    }

    async fn upsert_risk_assessment(
        &self,
        risk_id: Uuid,
        participant_id: Uuid,
        probability: RiskFactor,
        impact: RiskFactor,
    ) -> Result<RiskAssessment, CoreError> {
        Ok(Self::upsert_risk_assessment(self, risk_id, participant_id, probability, impact).await?)
    }

    async fn list_effort_assessments(
        &self,
        epic_id: Uuid,
    ) -> Result<Vec<EffortAssessment>, CoreError> {
        Ok(Self::list_effort_assessments(self, epic_id).await?)
    }

    async fn list_role_effort_assessments(
        &self,
        epic_id: Uuid,
        role_id: Uuid,
    ) -> Result<Vec<EffortAssessment>, CoreError> {
        Ok(Self::list_role_effort_assessments(self, epic_id, role_id).await?)
    }

    async fn list_risk_assessments(
        &self,
        risk_id: Uuid,
    ) -> Result<Vec<RiskAssessment>, CoreError> {
        Ok(Self::list_risk_assessments(self, risk_id).await?)
    }

    async fn count_effort_submitters(&self, epic_id: Uuid) -> Result<u64, CoreError> {
        Ok(Self::count_effort_submitters(self, epic_id).await?)
    }

    async fn count_risk_submitters(&self, risk_id: Uuid) -> Result<u64, CoreError> {
        Ok(Self::count_risk_submitters(self, risk_id).await?)
    }

    async fn list_effort_roles(&self, epic_id: Uuid) -> Result<Vec<Uuid>, CoreError> {
        Ok(Self::list_effort_roles(self, epic_id).await?)
    }

    async fn has_effort_assessment(
        &self,
        epic_id: Uuid,
        participant_id: Uuid,
    ) -> Result<bool, CoreError> {
        Ok(Self::has_effort_assessment(self, epic_id, participant_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_epic, seed_participant, seed_role, seed_team, test_service};
    use estimo_core::enums::ScoringStatus;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn resubmitting_effort_overwrites() {
        let svc = test_service().await;
        let alice = seed_participant(&svc, "alice", 60).await;
        let dev = seed_role(&svc, "dev").await;
        let qa = seed_role(&svc, "qa").await;
        let team = seed_team(&svc, "core", &[&alice]).await;
        let epic = seed_epic(&svc, &team, "EP-1").await;

        let first = svc
            .upsert_effort(epic.id, alice.id, dev.id, EffortValue::new(5).unwrap())
            .await
            .unwrap();
        let second = svc
            .upsert_effort(epic.id, alice.id, qa.id, EffortValue::new(8).unwrap())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.value.get(), 8);
        assert_eq!(second.role_id, qa.id);
        assert_eq!(svc.count_effort_submitters(epic.id).await.unwrap(), 1);
        assert_eq!(svc.list_effort_assessments(epic.id).await.unwrap().len(), 1);
        assert_eq!(svc.list_effort_roles(epic.id).await.unwrap(), vec![qa.id]);
        assert!(svc.has_effort_assessment(epic.id, alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn effort_roles_are_distinct_and_filterable() {
        let svc = test_service().await;
        let a = seed_participant(&svc, "a", 10).await;
        let b = seed_participant(&svc, "b", 20).await;
        let c = seed_participant(&svc, "c", 30).await;
        let dev = seed_role(&svc, "dev").await;
        let qa = seed_role(&svc, "qa").await;
        let team = seed_team(&svc, "core", &[&a, &b, &c]).await;
        let epic = seed_epic(&svc, &team, "EP-1").await;

        for (who, role) in [(&a, &dev), (&b, &dev), (&c, &qa)] {
            svc.upsert_effort(epic.id, who.id, role.id, EffortValue::new(3).unwrap())
                .await
                .unwrap();
        }

        assert_eq!(svc.list_effort_roles(epic.id).await.unwrap(), vec![dev.id, qa.id]);
        assert_eq!(
            svc.list_role_effort_assessments(epic.id, dev.id)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(svc.count_effort_submitters(epic.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn resubmitting_risk_assessment_overwrites() {
        let svc = test_service().await;
        let alice = seed_participant(&svc, "alice", 60).await;
        let team = seed_team(&svc, "core", &[&alice]).await;
        let epic = seed_epic(&svc, &team, "EP-1").await;
        let risk = svc
            .create_risk(epic.id, "latency", ScoringStatus::InProgress)
            .await
            .unwrap();

        let f = |v| RiskFactor::new(v).unwrap();
        svc.upsert_risk_assessment(risk.id, alice.id, f(1), f(1))
            .await
            .unwrap();
        let latest = svc
            .upsert_risk_assessment(risk.id, alice.id, f(3), f(4))
            .await
            .unwrap();

        assert_eq!(latest.score(), 12);
        assert_eq!(svc.count_risk_submitters(risk.id).await.unwrap(), 1);
        assert_eq!(svc.list_risk_assessments(risk.id).await.unwrap(), vec![latest]);
    }

    #[tokio::test]
    async fn effort_for_unknown_epic_conflicts() {
        let svc = test_service().await;
        let alice = seed_participant(&svc, "alice", 60).await;
        let dev = seed_role(&svc, "dev").await;
        let err = svc
            .upsert_effort(Uuid::new_v4(), alice.id, dev.id, EffortValue::new(1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }
}
