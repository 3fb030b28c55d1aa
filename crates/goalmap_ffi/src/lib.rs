//! Flutter-facing bindings for the goal-map core.

pub mod api;
