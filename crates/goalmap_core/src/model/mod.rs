//! Goal-map domain model.
//!
//! # Responsibility
//! - Define the goal graph aggregate shared by session, cache and remote copies.
//! - Keep graph rules pure: no I/O, no logging.
//!
//! # Invariants
//! - Every goal is identified by a stable `NodeId`.
//! - Capacity and connection rules are enforced on mutation and re-checked
//!   by `GoalMap::validate()` before persistence.

pub mod goal_map;
pub mod ids;
pub mod validation;
