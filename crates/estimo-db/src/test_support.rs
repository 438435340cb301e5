//! Shared fixtures for estimo-db unit tests.

use estimo_core::entities::{Epic, NewEpic, NewParticipant, Participant, Role, Team};
use estimo_core::inputs::Weight;

use crate::service::EstimoService;

/// In-memory service with migrations applied.
pub async fn test_service() -> EstimoService {
    EstimoService::new_local(":memory:").await.unwrap()
}

pub async fn seed_participant(svc: &EstimoService, handle: &str, weight: u8) -> Participant {
    svc.create_participant(NewParticipant {
        handle: handle.to_string(),
        first_name: handle.to_string(),
        last_name: "Tester".to_string(),
        weight: Weight::new(weight).unwrap(),
    })
    .await
    .unwrap()
}

pub async fn seed_role(svc: &EstimoService, name: &str) -> Role {
    svc.create_role(name, None).await.unwrap()
}

/// A team whose roster is exactly `members`.
pub async fn seed_team(svc: &EstimoService, name: &str, members: &[&Participant]) -> Team {
    let team = svc.create_team(name, None).await.unwrap();
    for member in members {
        svc.add_team_member(team.id, member.id).await.unwrap();
    }
    team
}

pub async fn seed_epic(svc: &EstimoService, team: &Team, number: &str) -> Epic {
    svc.create_epic(NewEpic {
        number: number.to_string(),
        name: format!("Epic {number}"),
        description: None,
        team_id: team.id,
    })
    .await
    .unwrap()
}
