//! Entity structs for all Estimo domain objects.
//!
//! Each entity maps to a table in the libSQL store. All structs derive
//! `Serialize` and `Deserialize` for JSON reports and console output.

mod assessment;
mod epic;
mod participant;
mod risk;
mod role;
mod team;

pub use assessment::{EffortAssessment, RiskAssessment, RoleAggregate};
pub use epic::{Epic, NewEpic};
pub use participant::{NewParticipant, Participant};
pub use risk::Risk;
pub use role::Role;
pub use team::Team;
