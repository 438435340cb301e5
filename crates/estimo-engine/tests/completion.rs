//! End-to-end scoring scenarios against an in-memory libSQL store.

use std::sync::Arc;

use estimo_core::entities::{Epic, NewEpic, NewParticipant, Participant, Role, Team};
use estimo_core::enums::ScoringStatus;
use estimo_core::inputs::{EffortValue, RiskFactor, Weight};
use estimo_db::EstimoService;
use estimo_engine::{Completion, EngineError, RiskOutcome, ScoringEngine};
use pretty_assertions::assert_eq;

struct Fixture {
    svc: Arc<EstimoService>,
    engine: ScoringEngine<EstimoService>,
    team: Team,
    members: Vec<Participant>,
    dev: Role,
    qa: Role,
}

impl Fixture {
    /// Team of three: two devs at weight 50 and one qa at weight 100.
    async fn new() -> Self {
        let svc = Arc::new(EstimoService::new_local(":memory:").await.unwrap());
        let engine = ScoringEngine::new(Arc::clone(&svc));
        let dev = svc.create_role("dev", None).await.unwrap();
        let qa = svc.create_role("qa", None).await.unwrap();
        let team = svc.create_team("core", None).await.unwrap();

        let mut members = Vec::new();
        for (handle, weight, role) in [("ann", 50, &dev), ("ben", 50, &dev), ("cat", 100, &qa)] {
            let p = svc
                .create_participant(NewParticipant {
                    handle: handle.into(),
                    first_name: handle.into(),
                    last_name: "Doe".into(),
                    weight: Weight::new(weight).unwrap(),
                })
                .await
                .unwrap();
            svc.assign_role(p.id, role.id).await.unwrap();
            svc.add_team_member(team.id, p.id).await.unwrap();
            members.push(p);
        }

        Self {
            svc,
            engine,
            team,
            members,
            dev,
            qa,
        }
    }

    async fn epic(&self, number: &str) -> Epic {
        self.svc
            .create_epic(NewEpic {
                number: number.into(),
                name: format!("Epic {number}"),
                description: None,
                team_id: self.team.id,
            })
            .await
            .unwrap()
    }

    /// Write all effort rows straight to the store, bypassing the engine's
    /// completion check.
    async fn seed_efforts(&self, epic: &Epic, values: [u32; 3]) {
        let roles = [self.dev.id, self.dev.id, self.qa.id];
        for ((member, role), value) in self.members.iter().zip(roles).zip(values) {
            self.svc
                .upsert_effort(epic.id, member.id, role, EffortValue::new(value).unwrap())
                .await
                .unwrap();
        }
    }
}

fn factor(v: u8) -> RiskFactor {
    RiskFactor::new(v).unwrap()
}

fn effort(v: u32) -> EffortValue {
    EffortValue::new(v).unwrap()
}

#[tokio::test]
async fn full_flow_yields_risk_adjusted_score() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-1").await;
    let low = fx.engine.add_risk(epic.id, "minor rework").await.unwrap();
    let high = fx.engine.add_risk(epic.id, "vendor delay").await.unwrap();
    assert_eq!(low.status, ScoringStatus::New);

    let started = fx.engine.start_scoring(epic.id).await.unwrap();
    assert_eq!(started.status, ScoringStatus::InProgress);
    assert_eq!(
        fx.svc.get_risk(high.id).await.unwrap().status,
        ScoringStatus::InProgress
    );

    let [ann, ben, cat] = [&fx.members[0], &fx.members[1], &fx.members[2]];

    // dev average 10, qa average 5
    let outcome = fx.engine.submit_effort(epic.id, ann.id, effort(10)).await.unwrap();
    assert_eq!(
        outcome,
        Completion::NotReady {
            submitted: 1,
            required: 3
        }
    );
    fx.engine.submit_effort(epic.id, ben.id, effort(10)).await.unwrap();
    let outcome = fx.engine.submit_effort(epic.id, cat.id, effort(5)).await.unwrap();
    assert_eq!(outcome, Completion::AwaitingRisks { pending: 2 });

    // low risk: everyone 1x3 -> 3.0
    for member in [ann, ben] {
        fx.engine
            .submit_risk(low.id, member.id, factor(1), factor(3))
            .await
            .unwrap();
    }
    let outcome = fx
        .engine
        .submit_risk(low.id, cat.id, factor(1), factor(3))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RiskOutcome {
            risk: Completion::Completed { score: 3.0 },
            epic: Some(Completion::AwaitingRisks { pending: 1 }),
        }
    );

    // high risk: (12*50 + 12*50 + 8*100) / 200 = 10.0
    fx.engine
        .submit_risk(high.id, ann.id, factor(3), factor(4))
        .await
        .unwrap();
    fx.engine
        .submit_risk(high.id, ben.id, factor(4), factor(3))
        .await
        .unwrap();
    let outcome = fx
        .engine
        .submit_risk(high.id, cat.id, factor(2), factor(4))
        .await
        .unwrap();
    assert_eq!(outcome.risk, Completion::Completed { score: 10.0 });
    // round(15 * 1.05 * 1.20) = 19
    assert_eq!(outcome.epic, Some(Completion::Completed { score: 19.0 }));

    let stored = fx.svc.get_epic(epic.id).await.unwrap();
    assert_eq!(stored.status, ScoringStatus::Complete);
    assert_eq!(stored.final_score, Some(19.0));

    let aggregates = fx.svc.list_role_aggregates(epic.id).await.unwrap();
    let avgs: Vec<f64> = aggregates.iter().map(|a| a.weighted_avg).collect();
    assert_eq!(avgs, vec![10.0, 5.0]);
}

#[tokio::test]
async fn epic_without_risks_completes_on_effort_quorum() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-2").await;
    fx.engine.start_scoring(epic.id).await.unwrap();

    fx.engine.submit_effort(epic.id, fx.members[0].id, effort(4)).await.unwrap();
    fx.engine.submit_effort(epic.id, fx.members[1].id, effort(8)).await.unwrap();
    let outcome = fx
        .engine
        .submit_effort(epic.id, fx.members[2].id, effort(3))
        .await
        .unwrap();

    // dev (4*50 + 8*50)/100 = 6, qa 3
    assert_eq!(outcome, Completion::Completed { score: 9.0 });
}

#[tokio::test]
async fn resubmission_overwrites_without_counting_twice() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-3").await;
    fx.engine.start_scoring(epic.id).await.unwrap();
    let ann = &fx.members[0];

    fx.engine.submit_effort(epic.id, ann.id, effort(20)).await.unwrap();
    let outcome = fx.engine.submit_effort(epic.id, ann.id, effort(30)).await.unwrap();

    assert_eq!(
        outcome,
        Completion::NotReady {
            submitted: 1,
            required: 3
        }
    );
    let rows = fx.svc.list_effort_assessments(epic.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value.get(), 30);
}

#[tokio::test]
async fn repeated_completion_check_commits_once() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-4").await;
    fx.engine.start_scoring(epic.id).await.unwrap();
    fx.seed_efforts(&epic, [2, 4, 6]).await;

    let first = fx.engine.try_complete_epic(epic.id).await.unwrap();
    assert_eq!(first, Completion::Completed { score: 9.0 });
    let after_first = fx.svc.get_epic(epic.id).await.unwrap();

    let second = fx.engine.try_complete_epic(epic.id).await.unwrap();
    assert_eq!(second, Completion::AlreadyComplete);
    assert_eq!(fx.svc.get_epic(epic.id).await.unwrap(), after_first);
    assert_eq!(fx.svc.list_role_aggregates(epic.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn racing_completions_commit_exactly_once() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-5").await;
    fx.engine.start_scoring(epic.id).await.unwrap();
    fx.seed_efforts(&epic, [10, 10, 5]).await;

    let (a, b) = tokio::join!(
        fx.engine.try_complete_epic(epic.id),
        fx.engine.try_complete_epic(epic.id)
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    assert_eq!(completed, 1);
    assert!(outcomes.contains(&Completion::AlreadyComplete));
    assert_eq!(
        fx.svc.get_epic(epic.id).await.unwrap().final_score,
        Some(15.0)
    );
}

#[tokio::test]
async fn storage_failure_aborts_and_retry_recovers() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-6").await;
    fx.engine.start_scoring(epic.id).await.unwrap();
    fx.seed_efforts(&epic, [10, 10, 5]).await;

    let conn = fx.svc.db().conn();
    conn.execute("DROP TABLE role_aggregates", ()).await.unwrap();

    let err = fx.engine.try_complete_epic(epic.id).await.unwrap_err();
    assert!(err.is_storage(), "unexpected error: {err}");
    let stored = fx.svc.get_epic(epic.id).await.unwrap();
    assert_eq!(stored.status, ScoringStatus::InProgress);
    assert_eq!(stored.final_score, None);

    conn.execute(
        "CREATE TABLE role_aggregates (
             epic_id TEXT NOT NULL REFERENCES epics(id) ON DELETE CASCADE,
             role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
             weighted_avg REAL NOT NULL,
             PRIMARY KEY (epic_id, role_id)
         )",
        (),
    )
    .await
    .unwrap();

    let retry = fx.engine.try_complete_epic(epic.id).await.unwrap();
    assert_eq!(retry, Completion::Completed { score: 15.0 });
}

#[tokio::test]
async fn empty_team_never_completes() {
    let fx = Fixture::new().await;
    let empty = fx.svc.create_team("ghosts", None).await.unwrap();
    let epic = fx
        .svc
        .create_epic(NewEpic {
            number: "EP-7".into(),
            name: "Nobody home".into(),
            description: None,
            team_id: empty.id,
        })
        .await
        .unwrap();
    fx.engine.start_scoring(epic.id).await.unwrap();

    let outcome = fx.engine.try_complete_epic(epic.id).await.unwrap();
    assert_eq!(
        outcome,
        Completion::NotReady {
            submitted: 0,
            required: 0
        }
    );
}

#[tokio::test]
async fn submissions_are_validated() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-8").await;
    let ann = &fx.members[0];

    let err = fx
        .engine
        .submit_effort(epic.id, ann.id, effort(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotOpen { status: ScoringStatus::New, .. }));

    fx.engine.start_scoring(epic.id).await.unwrap();

    let outsider = fx
        .svc
        .create_participant(NewParticipant {
            handle: "zed".into(),
            first_name: "Zed".into(),
            last_name: "Out".into(),
            weight: Weight::new(10).unwrap(),
        })
        .await
        .unwrap();
    fx.svc.assign_role(outsider.id, fx.dev.id).await.unwrap();
    let err = fx
        .engine
        .submit_effort(epic.id, outsider.id, effort(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAMember { .. }));

    fx.svc.unassign_role(ann.id, fx.dev.id).await.unwrap();
    let err = fx
        .engine
        .submit_effort(epic.id, ann.id, effort(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoRole(id) if id == ann.id));

    let err = fx.engine.start_scoring(epic.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(_)));
}

#[tokio::test]
async fn risks_added_mid_scoring_hold_back_completion() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-9").await;
    fx.engine.start_scoring(epic.id).await.unwrap();

    let late = fx.engine.add_risk(epic.id, "late discovery").await.unwrap();
    assert_eq!(late.status, ScoringStatus::InProgress);

    fx.seed_efforts(&epic, [1, 1, 1]).await;
    assert_eq!(
        fx.engine.try_complete_epic(epic.id).await.unwrap(),
        Completion::AwaitingRisks { pending: 1 }
    );
    // "not yet" leaves no aggregates behind
    assert!(fx.svc.list_role_aggregates(epic.id).await.unwrap().is_empty());

    for member in &fx.members {
        fx.engine
            .submit_risk(late.id, member.id, factor(4), factor(4))
            .await
            .unwrap();
    }
    let stored = fx.svc.get_epic(epic.id).await.unwrap();
    // dev 1 + qa 1 = 2, risk 16 -> x1.30 -> 2.6 -> 3
    assert_eq!(stored.final_score, Some(3.0));

    let err = fx.engine.add_risk(epic.id, "too late").await.unwrap_err();
    assert!(matches!(err, EngineError::NotOpen { .. }));
}

#[tokio::test]
async fn report_shows_progress_then_results() {
    let fx = Fixture::new().await;
    let epic = fx.epic("EP-10").await;
    fx.engine.start_scoring(epic.id).await.unwrap();
    fx.engine
        .submit_effort(epic.id, fx.members[0].id, effort(6))
        .await
        .unwrap();

    let report = fx.engine.epic_report(epic.id).await.unwrap();
    assert_eq!(report.members, 3);
    assert_eq!(report.effort_submitted, 1);
    assert_eq!(report.missing, vec!["ben".to_string(), "cat".to_string()]);
    assert_eq!(report.roles.len(), 1);
    assert!(report.roles[0].provisional);
    assert!(report.to_string().contains("waiting on: ben, cat"));

    fx.engine
        .submit_effort(epic.id, fx.members[1].id, effort(6))
        .await
        .unwrap();
    fx.engine
        .submit_effort(epic.id, fx.members[2].id, effort(2))
        .await
        .unwrap();

    let report = fx.engine.epic_report(epic.id).await.unwrap();
    assert!(report.missing.is_empty());
    assert_eq!(report.final_score, Some(8.0));
    assert!(report.roles.iter().all(|r| !r.provisional));
    assert!(report.to_string().ends_with("final score: 8"));
}

#[tokio::test]
async fn shrinking_the_roster_completes_waiting_epics() {
    let fx = Fixture::new().await;
    let [ann, ben, cat] = [&fx.members[0], &fx.members[1], &fx.members[2]];
    let epic = fx.epic("EP-9").await;
    let risk = fx.engine.add_risk(epic.id, "flaky vendor").await.unwrap();
    let untouched = fx.epic("EP-10").await;
    fx.engine.start_scoring(epic.id).await.unwrap();
    fx.engine.start_scoring(untouched.id).await.unwrap();

    fx.engine.submit_effort(epic.id, ann.id, effort(10)).await.unwrap();
    fx.engine.submit_effort(epic.id, ben.id, effort(20)).await.unwrap();
    fx.engine.submit_risk(risk.id, ann.id, factor(2), factor(2)).await.unwrap();
    fx.engine.submit_risk(risk.id, ben.id, factor(1), factor(3)).await.unwrap();

    fx.svc.remove_team_member(fx.team.id, cat.id).await.unwrap();
    let completed = fx.engine.recheck_team(fx.team.id).await.unwrap();

    // dev (10*50 + 20*50)/100 = 15; risk (4 + 3)/2 = 3.5 rounds to 4 -> 1.05
    let scores: Vec<(&str, f64)> = completed
        .iter()
        .map(|(e, score)| (e.number.as_str(), *score))
        .collect();
    assert_eq!(scores, vec![("EP-9", 16.0)]);
    assert_eq!(
        fx.svc.get_risk(risk.id).await.unwrap().status,
        ScoringStatus::Complete
    );
    assert_eq!(
        fx.svc.get_epic(untouched.id).await.unwrap().status,
        ScoringStatus::InProgress
    );

    let again = fx.engine.recheck_team(fx.team.id).await.unwrap();
    assert!(again.is_empty());
}
