//! Reply text shared by the router's handlers.

use std::fmt::Write as _;

use estimo_core::entities::{Epic, Participant, Risk};
use estimo_engine::Completion;

use crate::action::Access;

/// Longest risk description shown on a button before it is cut.
const RISK_LABEL_MAX: usize = 50;
const RISK_LABEL_KEEP: usize = 47;

pub(crate) fn participant_label(p: &Participant) -> String {
    format!("@{} {}", p.handle, p.display_name())
}

pub(crate) fn epic_label(epic: &Epic) -> String {
    format!("#{} {}", epic.number, epic.name)
}

pub(crate) fn risk_label(risk: &Risk) -> String {
    truncate(&risk.description)
}

fn truncate(text: &str) -> String {
    if text.chars().count() > RISK_LABEL_MAX {
        let kept: String = text.chars().take(RISK_LABEL_KEEP).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

pub(crate) fn epic_progress(epic: &Epic, completion: &Completion) -> String {
    let label = epic_label(epic);
    match completion {
        Completion::NotReady {
            submitted,
            required,
        } => format!("{label}: {submitted}/{required} estimates in"),
        Completion::AwaitingRisks { pending } => {
            format!("{label}: all estimates in, waiting on {pending} open risk(s)")
        }
        Completion::AlreadyComplete => format!("{label} is already complete"),
        Completion::Completed { score } => format!("{label} is complete, final score {score}"),
    }
}

pub(crate) fn risk_progress(completion: &Completion) -> String {
    match completion {
        Completion::NotReady {
            submitted,
            required,
        } => format!("risk: {submitted}/{required} assessments in"),
        Completion::Completed { score } => format!("risk complete, weighted score {score:.2}"),
        Completion::AlreadyComplete | Completion::AwaitingRisks { .. } => {
            "risk is already complete".into()
        }
    }
}

pub(crate) fn roster(team: &str, members: &[(Participant, Option<String>)]) -> String {
    if members.is_empty() {
        return format!("{team} has no members");
    }
    let mut out = format!("{team} ({} members):", members.len());
    for (p, role) in members {
        let role = role.as_deref().unwrap_or("no role");
        let _ = write!(out, "\n@{} {} - {role}", p.handle, p.display_name());
    }
    out
}

pub(crate) fn help(access: Access) -> String {
    let mut out = String::from("Commands\n\nFor everyone:\n");
    out.push_str("/score - assess epics and risks of your teams\n");
    out.push_str("/status - progress of an epic being scored\n");

    if access >= Access::Admin {
        out.push_str("\nFor administrators:\n");
        out.push_str("/addrole <name> - create a role\n");
        out.push_str("/addteam <name> - create a team\n");
        out.push_str("/adduser - register a participant\n");
        out.push_str("/assignrole, /unassignrole - manage a participant's roles\n");
        out.push_str("/assignteam, /removefromteam - manage team membership\n");
        out.push_str("/renameuser - rename a participant\n");
        out.push_str("/changeweight - change a participant's weight\n");
        out.push_str("/addepic - create an epic\n");
        out.push_str("/addrisk - add a risk to an epic\n");
        out.push_str("/startscore - open an epic for scoring\n");
        out.push_str("/results - results of a completed epic\n");
        out.push_str("/members - team roster\n");
    }
    if access >= Access::SuperAdmin {
        out.push_str("\nFor super administrators:\n");
        out.push_str("/deleteepic, /deleterisk, /deleteuser - remove data\n");
    }
    if access == Access::Anyone {
        out.push_str("\nAsk an administrator for anything else.");
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn long_risk_descriptions_are_cut() {
        let short = "a".repeat(50);
        assert_eq!(truncate(&short), short);

        let long = "б".repeat(60);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), 50);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn help_grows_with_access() {
        let anyone = help(Access::Anyone);
        assert!(anyone.contains("/score"));
        assert!(!anyone.contains("/addepic"));

        let admin = help(Access::Admin);
        assert!(admin.contains("/addepic"));
        assert!(!admin.contains("/deleteepic"));

        assert!(help(Access::SuperAdmin).contains("/deleteepic"));
    }

    #[test]
    fn risk_progress_reads_naturally() {
        assert_eq!(
            risk_progress(&Completion::NotReady {
                submitted: 1,
                required: 3
            }),
            "risk: 1/3 assessments in"
        );
        assert_eq!(
            risk_progress(&Completion::Completed { score: 10.0 }),
            "risk complete, weighted score 10.00"
        );
    }
}
