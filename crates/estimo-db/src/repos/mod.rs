//! Repository modules, one per entity group.
//!
//! Each module adds inherent methods to `EstimoService` and implements the
//! matching trait from `estimo_core::repository` on top of them.

pub mod assessment;
pub mod epic;
pub mod participant;
pub mod risk;
pub mod role;
pub mod team;
