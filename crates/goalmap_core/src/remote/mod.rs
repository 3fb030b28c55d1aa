//! Remote goal-map store contract and wire shapes.
//!
//! # Responsibility
//! - Define the `RemoteStore` SPI consumed by the sync reconciler.
//! - Define the JSON request/response shapes of the goal-map resource.
//!
//! # Invariants
//! - "No map yet" is `Ok(None)` from `fetch_by_project`, never an error.
//! - Implementations never retry on their own; retry is a caller decision.

mod http;
mod memory;

pub use http::HttpRemoteStore;
pub use memory::{InMemoryRemoteStore, RemoteOp};

use crate::model::goal_map::{GoalConnection, GoalMap, GoalNode};
use crate::model::ids::Revision;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Resource does not exist (HTTP 404 on a keyed resource).
    NotFound,
    /// Non-success HTTP status.
    Http { status: u16, body: String },
    /// Transport failure, including timeouts.
    Network(String),
    /// Response body did not match the expected shape.
    Decode(String),
    /// Client could not be constructed from configuration.
    InvalidConfig(String),
}

impl RemoteError {
    /// Short stable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Http { .. } => "http_status",
            Self::Network(_) => "network",
            Self::Decode(_) => "decode",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "remote goal map not found"),
            Self::Http { status, body } if body.is_empty() => {
                write!(f, "remote store returned HTTP {status}")
            }
            Self::Http { status, body } => {
                write!(f, "remote store returned HTTP {status}: {body}")
            }
            Self::Network(message) => write!(f, "remote store unreachable: {message}"),
            Self::Decode(message) => write!(f, "unexpected remote response: {message}"),
            Self::InvalidConfig(message) => write!(f, "invalid remote configuration: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Goal map as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGoalMap {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub project_id: String,
    #[serde(default, alias = "goals")]
    pub nodes: Vec<GoalNode>,
    #[serde(default)]
    pub connections: Vec<GoalConnection>,
    #[serde(default, alias = "updatedAt")]
    pub last_updated: i64,
}

impl RemoteGoalMap {
    /// Converts into a session map carrying the given local `revision`.
    pub fn into_goal_map(self, revision: Revision) -> GoalMap {
        GoalMap {
            id: Some(self.id),
            name: self.name,
            project_id: self.project_id,
            nodes: self.nodes,
            connections: self.connections,
            last_updated: self.last_updated,
            revision,
            completed: false,
        }
    }
}

/// `data` envelope of create/update bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalMapData {
    pub goals: Vec<GoalNode>,
    pub connections: Vec<GoalConnection>,
    pub timestamp: i64,
    pub version: Revision,
}

impl GoalMapData {
    pub fn from_map(map: &GoalMap) -> Self {
        Self {
            goals: map.nodes.clone(),
            connections: map.connections.clone(),
            timestamp: map.last_updated,
            version: map.revision,
        }
    }
}

/// Body of `POST /goal-maps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalMapRequest {
    pub project_id: String,
    pub name: String,
    pub data: GoalMapData,
}

/// Body of `PUT /goal-maps/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalMapRequest {
    pub name: String,
    pub data: GoalMapData,
}

/// Body of `POST /project-progress/goal-mapping/complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_goals: Option<Vec<GoalNode>>,
}

/// Completion response; the goals echo is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    #[serde(default, alias = "currentGoals")]
    pub goals: Option<Vec<GoalNode>>,
    #[serde(default)]
    pub connections: Option<Vec<GoalConnection>>,
}

/// Remote goal-map resource SPI.
pub trait RemoteStore {
    /// Fetches the map for `project_id`; `Ok(None)` when none exists yet.
    fn fetch_by_project(&self, project_id: &str) -> RemoteResult<Option<RemoteGoalMap>>;
    fn create(&self, request: &CreateGoalMapRequest) -> RemoteResult<RemoteGoalMap>;
    fn update(&self, id: &str, request: &UpdateGoalMapRequest) -> RemoteResult<RemoteGoalMap>;
    fn mark_complete(&self, request: &CompletionRequest) -> RemoteResult<CompletionResponse>;
}

impl<R: RemoteStore + ?Sized> RemoteStore for Arc<R> {
    fn fetch_by_project(&self, project_id: &str) -> RemoteResult<Option<RemoteGoalMap>> {
        (**self).fetch_by_project(project_id)
    }

    fn create(&self, request: &CreateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        (**self).create(request)
    }

    fn update(&self, id: &str, request: &UpdateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        (**self).update(id, request)
    }

    fn mark_complete(&self, request: &CompletionRequest) -> RemoteResult<CompletionResponse> {
        (**self).mark_complete(request)
    }
}

impl<R: RemoteStore + ?Sized> RemoteStore for Box<R> {
    fn fetch_by_project(&self, project_id: &str) -> RemoteResult<Option<RemoteGoalMap>> {
        (**self).fetch_by_project(project_id)
    }

    fn create(&self, request: &CreateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        (**self).create(request)
    }

    fn update(&self, id: &str, request: &UpdateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        (**self).update(id, request)
    }

    fn mark_complete(&self, request: &CompletionRequest) -> RemoteResult<CompletionResponse> {
        (**self).mark_complete(request)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CompletionRequest, CompletionResponse, CreateGoalMapRequest, GoalMapData, RemoteGoalMap,
    };
    use crate::model::goal_map::GoalMap;
    use serde_json::json;

    #[test]
    fn create_body_uses_wire_field_names() {
        let mut map = GoalMap::new("p1", "Success Map");
        map.add_node("Grow revenue", "Q3", 1).unwrap();
        map.last_updated = 1_700;

        let body = serde_json::to_value(CreateGoalMapRequest {
            project_id: map.project_id.clone(),
            name: map.name.clone(),
            data: GoalMapData::from_map(&map),
        })
        .unwrap();

        assert_eq!(body["projectId"], "p1");
        assert_eq!(body["data"]["timestamp"], 1_700);
        assert_eq!(body["data"]["version"], 1);
        assert_eq!(body["data"]["goals"][0]["text"], "Grow revenue");
        assert_eq!(body["data"]["goals"][0]["timeframe"], "Q3");
    }

    #[test]
    fn completion_request_omits_absent_goals() {
        let body = serde_json::to_value(CompletionRequest {
            project_id: "p1".to_string(),
            current_goals: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "projectId": "p1" }));
    }

    #[test]
    fn remote_map_accepts_minimal_and_aliased_payloads() {
        let minimal: RemoteGoalMap =
            serde_json::from_value(json!({ "id": "m1", "projectId": "p1" })).unwrap();
        assert!(minimal.nodes.is_empty());

        let aliased: RemoteGoalMap = serde_json::from_value(json!({
            "id": "m1",
            "projectId": "p1",
            "goals": [{ "id": "g1", "text": "Cut cost", "level": 2 }],
            "updatedAt": 55
        }))
        .unwrap();
        assert_eq!(aliased.nodes.len(), 1);
        assert_eq!(aliased.nodes[0].timeframe, "");
        assert_eq!(aliased.last_updated, 55);

        let echo: CompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(echo.goals.is_none());
    }
}
