//! Project bearings progress derived from per-tool completion signals.
//!
//! # Responsibility
//! - Combine goal mapping, situational assessment and delivery stage
//!   completion into one status.
//!
//! # Invariants
//! - Pure reads: nothing here performs I/O or mutates tool state.
//! - `Completed` requires every signal; `NotStarted` requires none.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const TOOL_COUNT: u8 = 3;

/// Aggregate progress across the bearings tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BearingsStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl BearingsStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl Display for BearingsStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Situational assessment tool state. Complete once a domain is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SituationalAssessment {
    #[serde(default)]
    pub selected_domain: Option<String>,
}

impl SituationalAssessment {
    pub fn is_complete(&self) -> bool {
        self.selected_domain
            .as_deref()
            .is_some_and(|domain| !domain.trim().is_empty())
    }
}

/// Delivery stage tool state. Complete once a stage is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStage {
    #[serde(default)]
    pub stage: Option<String>,
}

impl DeliveryStage {
    pub fn is_complete(&self) -> bool {
        self.stage
            .as_deref()
            .is_some_and(|stage| !stage.trim().is_empty())
    }
}

/// Completion flags for each bearings tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSignals {
    pub goal_mapping: bool,
    pub situational_assessment: bool,
    pub delivery_stage: bool,
}

impl CompletionSignals {
    pub fn new(goal_mapping: bool, situational_assessment: bool, delivery_stage: bool) -> Self {
        Self {
            goal_mapping,
            situational_assessment,
            delivery_stage,
        }
    }

    /// Builds signals from typed tool state.
    pub fn from_tools(
        goal_mapping_completed: bool,
        assessment: &SituationalAssessment,
        delivery: &DeliveryStage,
    ) -> Self {
        Self::new(
            goal_mapping_completed,
            assessment.is_complete(),
            delivery.is_complete(),
        )
    }

    pub fn completed_count(&self) -> u8 {
        [
            self.goal_mapping,
            self.situational_assessment,
            self.delivery_stage,
        ]
        .into_iter()
        .map(u8::from)
        .sum()
    }
}

/// Read-only view over `CompletionSignals`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressAggregator {
    signals: CompletionSignals,
}

impl ProgressAggregator {
    pub fn new(signals: CompletionSignals) -> Self {
        Self { signals }
    }

    pub fn signals(&self) -> CompletionSignals {
        self.signals
    }

    pub fn bearings_status(&self) -> BearingsStatus {
        match self.signals.completed_count() {
            0 => BearingsStatus::NotStarted,
            TOOL_COUNT => BearingsStatus::Completed,
            _ => BearingsStatus::InProgress,
        }
    }

    /// Share of completed tools, rounded down: 0, 33, 66 or 100.
    pub fn completion_percent(&self) -> u8 {
        self.signals.completed_count() * 100 / TOOL_COUNT
    }
}
