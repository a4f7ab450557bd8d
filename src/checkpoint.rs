//! Suspension checkpoints and the stable resume identifier.

use crate::error::EngineError;
use crate::node::NodeName;
use crate::state::State;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Stable identifier for one run, used to resume a suspension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node's request to pause the run for an external decision.
///
/// Emitted before the node performs its side-effecting action, so the
/// decision maker sees what would happen, not what already did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendRequest {
    /// The action the node wants to perform.
    pub action: String,
    /// Machine-readable risk/impact summary for the decision maker.
    pub impact: String,
}

impl SuspendRequest {
    /// Creates a new suspension request.
    pub fn new(action: impl Into<String>, impact: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            impact: impact.into(),
        }
    }
}

/// Snapshot of a suspended run.
///
/// Captured by the executor when a node signals suspension and consumed
/// exactly once by a resume call. Serializes to a flat JSON record so a
/// suspension can survive a process restart; the round trip is exact, so
/// resuming a deserialized checkpoint behaves identically to resuming the
/// original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identifier under which the executor parked this run.
    pub run_id: RunId,
    /// The node that requested the suspension; resume re-enters it.
    pub node: NodeName,
    /// Full state snapshot, including the suspending node's own update.
    pub state: State,
    /// Per-node execution counters at the moment of suspension.
    pub visits: HashMap<NodeName, u32>,
    /// Why the run is paused.
    pub request: SuspendRequest,
}

impl Checkpoint {
    /// Serializes the checkpoint to a JSON record.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores a checkpoint from its JSON record.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(raw)?)
    }
}
