//! Epic repository: CRUD, status transitions, and the completion commit.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use estimo_core::entities::{Epic, NewEpic, RoleAggregate};
use estimo_core::enums::{EntityType, ScoringStatus};
use estimo_core::errors::CoreError;
use estimo_core::repository::{EpicCompletion, EpicRepo};

use crate::error::DatabaseError;
use crate::helpers::{collect_rows, get_opt_string, get_uuid, parse_datetime, parse_enum};
use crate::service::EstimoService;

const SELECT_COLS: &str =
    "id, number, name, description, team_id, status, final_score, created_at, updated_at";

fn row_to_epic(row: &libsql::Row) -> Result<Epic, DatabaseError> {
    Ok(Epic {
        id: get_uuid(row, 0)?,
        number: row.get(1)?,
        name: row.get(2)?,
        description: get_opt_string(row, 3)?,
        team_id: get_uuid(row, 4)?,
        status: parse_enum(&row.get::<String>(5)?)?,
        final_score: row.get::<Option<f64>>(6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

fn row_to_aggregate(row: &libsql::Row) -> Result<RoleAggregate, DatabaseError> {
    Ok(RoleAggregate {
        epic_id: get_uuid(row, 0)?,
        role_id: get_uuid(row, 1)?,
        weighted_avg: row.get(2)?,
    })
}

impl EstimoService {
    pub async fn create_epic(&self, new: NewEpic) -> Result<Epic, DatabaseError> {
        self.get_team(new.team_id).await?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let _guard = self.write_lock().await;
        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO epics ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)"
                ),
                libsql::params![
                    id.to_string(),
                    new.number.as_str(),
                    new.name.as_str(),
                    new.description.as_deref(),
                    new.team_id.to_string(),
                    ScoringStatus::New.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| {
                DatabaseError::or_conflict(e, || format!("epic {} already exists", new.number))
            })?;

        tracing::info!(epic_id = %id, number = %new.number, "epic created");
        Ok(Epic {
            id,
            number: new.number,
            name: new.name,
            description: new.description,
            team_id: new.team_id,
            status: ScoringStatus::New,
            final_score: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_epic(&self, id: Uuid) -> Result<Epic, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM epics WHERE id = ?1"),
                [id.to_string()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::not_found(EntityType::Epic, id))?;
        row_to_epic(&row)
    }

    pub async fn find_epic_by_number(&self, number: &str) -> Result<Option<Epic>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM epics WHERE number = ?1"),
                [number],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_epic(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_epics(&self) -> Result<Vec<Epic>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(&format!("SELECT {SELECT_COLS} FROM epics ORDER BY number"), ())
            .await?;
        collect_rows(rows, row_to_epic).await
    }

    pub async fn list_epics_by_status(
        &self,
        status: ScoringStatus,
    ) -> Result<Vec<Epic>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM epics WHERE status = ?1 ORDER BY number"),
                [status.as_str()],
            )
            .await?;
        collect_rows(rows, row_to_epic).await
    }

    pub async fn list_team_epics(
        &self,
        team_id: Uuid,
        status: ScoringStatus,
    ) -> Result<Vec<Epic>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM epics
                     WHERE team_id = ?1 AND status = ?2 ORDER BY number"
                ),
                libsql::params![team_id.to_string(), status.as_str()],
            )
            .await?;
        collect_rows(rows, row_to_epic).await
    }

    /// In-progress epics of the team with an effort estimate or an in-progress
    /// risk still owed by the participant.
    pub async fn list_epics_pending_for(
        &self,
        participant_id: Uuid,
        team_id: Uuid,
    ) -> Result<Vec<Epic>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM epics e
                     WHERE e.team_id = ?2 AND e.status = 'in_progress'
                       AND (
                         NOT EXISTS (SELECT 1 FROM effort_assessments a
                                     WHERE a.epic_id = e.id AND a.participant_id = ?1)
                         OR EXISTS (SELECT 1 FROM risks r
                                    WHERE r.epic_id = e.id AND r.status = 'in_progress'
                                      AND NOT EXISTS (SELECT 1 FROM risk_assessments ra
                                                      WHERE ra.risk_id = r.id
                                                        AND ra.participant_id = ?1))
                       )
                     ORDER BY e.number"
                ),
                [participant_id.to_string(), team_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_epic).await
    }

    /// Move an epic one step along `new → in_progress → complete`.
    ///
    /// The write is conditional on the status read beforehand, so a concurrent
    /// transition surfaces as `InvalidTransition` instead of being overwritten.
    pub async fn transition_epic(
        &self,
        id: Uuid,
        to: ScoringStatus,
    ) -> Result<Epic, DatabaseError> {
        let current = self.get_epic(id).await?;
        let invalid = || DatabaseError::InvalidTransition {
            entity_type: EntityType::Epic,
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
                    "UPDATE epics SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
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

        tracing::debug!(epic_id = %id, from = %current.status, to = %to, "epic transitioned");
        Ok(Epic {
            status: to,
            updated_at: now,
            ..current
        })
    }

    /// Mark the epic complete with its final score and upsert the role
    /// aggregates, in one transaction.
    ///
    /// Returns `false` (and writes nothing) if the epic was already complete.
    pub async fn commit_epic_completion(
        &self,
        completion: &EpicCompletion,
    ) -> Result<bool, DatabaseError> {
        let _guard = self.write_lock().await;
        let tx = self.db().conn().transaction().await?;

        match apply_epic_completion(&tx, completion).await {
            Ok(true) => {
                tx.commit().await?;
                Ok(true)
            }
            Ok(false) => {
                tx.rollback().await?;
                Ok(false)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(epic_id = %completion.epic_id, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    pub async fn list_role_aggregates(
        &self,
        epic_id: Uuid,
    ) -> Result<Vec<RoleAggregate>, DatabaseError> {
        let rows = self
            .db()
            .conn()
            .query(
                "SELECT ra.epic_id, ra.role_id, ra.weighted_avg
                 FROM role_aggregates ra JOIN roles r ON r.id = ra.role_id
                 WHERE ra.epic_id = ?1 ORDER BY r.name",
                [epic_id.to_string()],
            )
            .await?;
        collect_rows(rows, row_to_aggregate).await
    }

    /// Delete an epic; its risks, assessments, and aggregates cascade.
    pub async fn delete_epic(&self, id: Uuid) -> Result<(), DatabaseError> {
        let _guard = self.write_lock().await;
        let changed = self
            .db()
            .conn()
            .execute("DELETE FROM epics WHERE id = ?1", [id.to_string()])
            .await?;
        if changed == 0 {
            return Err(DatabaseError::not_found(EntityType::Epic, id));
        }
        tracing::info!(epic_id = %id, "epic deleted");
        Ok(())
    }
}

async fn apply_epic_completion(
    conn: &libsql::Connection,
    completion: &EpicCompletion,
) -> Result<bool, DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE epics SET status = 'complete', final_score = ?1, updated_at = ?2
             WHERE id = ?3 AND status <> 'complete'",
            libsql::params![
                completion.final_score,
                Utc::now().to_rfc3339(),
                completion.epic_id.to_string()
            ],
        )
        .await?;
    if changed == 0 {
        return Ok(false);
    }

    for aggregate in &completion.role_aggregates {
        conn.execute(
            "INSERT INTO role_aggregates (epic_id, role_id, weighted_avg) VALUES (?1, ?2, ?3)
             ON CONFLICT(epic_id, role_id) DO UPDATE SET weighted_avg = excluded.weighted_avg",
            libsql::params![
                aggregate.epic_id.to_string(),
                aggregate.role_id.to_string(),
                aggregate.weighted_avg
            ],
        )
        .await?;
    }
    Ok(true)
}

#[async_trait]
impl EpicRepo for EstimoService {
    async fn create_epic(&self, new: NewEpic) -> Result<Epic, CoreError> {
        Ok(Self::create_epic(self, new).await?)
    }

    async fn get_epic(&self, id: Uuid) -> Result<Epic, CoreError> {
        Ok(Self::get_epic(self, id).await?)
    }

    async fn find_epic_by_number(&self, number: &str) -> Result<Option<Epic>, CoreError> {
        Ok(Self::find_epic_by_number(self, number).await?)
    }

    async fn list_epics(&self) -> Result<Vec<Epic>, CoreError> {
        Ok(Self::list_epics(self).await?)
    }

    async fn list_epics_by_status(&self, status: ScoringStatus) -> Result<Vec<Epic>, CoreError> {
        Ok(Self::list_epics_by_status(self, status).await?)
    }

    async fn list_team_epics(
        &self,
        team_id: Uuid,
        status: ScoringStatus,
    ) -> Result<Vec<Epic>, CoreError> {
        Ok(Self::list_team_epics(self, team_id, status).await?)
    }

    async fn list_epics_pending_for(
        &self,
        participant_id: Uuid,
        team_id: Uuid,
    ) -> Result<Vec<Epic>, CoreError> {
        Ok(Self::list_epics_pending_for(self, participant_id, team_id).await?)
    }

    async fn transition_epic(&self, id: Uuid, to: ScoringStatus) -> Result<Epic, CoreError> {
        Ok(Self::transition_epic(self, id, to).await?)
    }

    async fn commit_epic_completion(&self, completion: &EpicCompletion) -> Result<bool, CoreError> {
        Ok(Self::commit_epic_completion(self, completion).await?)
    }

    async fn list_role_aggregates(&self, epic_id: Uuid) -> Result<Vec<RoleAggregate>, CoreError> {
        Ok(Self::list_role_aggregates(self, epic_id).await?)
    }

    async fn delete_epic(&self, id: Uuid) -> Result<(), CoreError> {
        Ok(Self::delete_epic(self, id).await?)
    }
}
