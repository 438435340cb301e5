//! # estimo-core
//!
//! Core types, validated inputs, and error types for Estimo.
//!
//! This crate provides the foundational types shared across all Estimo crates:
//! - Entity structs for all domain objects (participants, teams, epics, risks, assessments)
//! - The scoring status enum with its state machine transitions
//! - Range-checked input types for weights, effort values, and risk factors
//! - Cross-cutting error types
//! - Async repository traits implemented by the store and consumed by the engine

pub mod entities;
pub mod enums;
pub mod errors;
pub mod inputs;
pub mod repository;
