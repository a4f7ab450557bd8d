use crate::checkpoint::RunId;
use crate::graph::Outcome;
use crate::node::NodeName;
use thiserror::Error;

/// Errors detected while compiling a graph definition.
///
/// A malformed graph never compiles into a plan: validation errors are fatal
/// and never silently repaired. They surface mistakes like an orphaned
/// refinement node at build time rather than at run time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// `start_with` was never called.
    #[error("Start node must be specified")]
    MissingStart,

    /// `start_with` was called more than once.
    #[error("Start node specified more than once")]
    DuplicateStart,

    /// The start node is not a declared node.
    #[error("Unknown start node: {0}")]
    UnknownStart(NodeName),

    /// Two nodes were registered under the same name.
    #[error("Duplicate node name: {0}")]
    DuplicateNode(NodeName),

    /// A node was given a second outgoing edge.
    ///
    /// Every node has exactly one outgoing path: either one unconditional
    /// edge or one conditional edge.
    #[error("Node '{0}' already has an outgoing edge")]
    DuplicateEdge(NodeName),

    /// A node has no outgoing edge at all.
    #[error("Node '{0}' has no outgoing edge")]
    MissingEdge(NodeName),

    /// An edge was registered from a name that is not a declared node.
    #[error("Edge from undeclared node: {0}")]
    UnknownSource(NodeName),

    /// An edge destination is neither a declared node nor the terminal
    /// marker.
    #[error("Edge from '{from}' references undeclared node: {to}")]
    DanglingEdge {
        /// The edge's source node.
        from: NodeName,
        /// The undeclared destination.
        to: NodeName,
    },

    /// A conditional edge declares an empty outcome set.
    #[error("Conditional edge from '{0}' declares no outcomes")]
    EmptyOutcomes(NodeName),

    /// A declared node cannot be reached from the start node over any
    /// combination of edges and outcomes.
    #[error("Node unreachable from start: {0}")]
    Unreachable(NodeName),
}

/// Errors that terminate a run.
///
/// Each variant names the node (or run) it originated from, so callers can
/// tell "gave up after looping" apart from "crashed" apart from "the graph
/// definition itself is wrong".
///
/// Suspension is *not* represented here: a pending external decision is a
/// normal outcome, reported as
/// [`RunStatus::Suspended`](crate::RunStatus::Suspended).
///
/// # Non-Exhaustive
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code. When matching
/// on this error, always include a wildcard pattern:
///
/// ```
/// use meguru::EngineError;
///
/// fn describe(error: &EngineError) {
///     match error {
///         EngineError::NodeFailure { node, details } => {
///             eprintln!("node {} failed: {}", node, details);
///         }
///         EngineError::IterationLimit { node, limit } => {
///             eprintln!("node {} looped past {} revisits", node, limit);
///         }
///         _ => eprintln!("run failed: {}", error),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// A node's work function returned an error.
    #[error("Node failed: {node}, details: {details}")]
    NodeFailure {
        /// The name of the node that failed
        node: NodeName,
        /// Details about the failure
        details: String,
    },

    /// A node exceeded the configured per-node timeout.
    #[error("Timeout occurred in node: {node}")]
    Timeout {
        /// The name of the node that timed out
        node: NodeName,
    },

    /// A node was about to execute more than `max_revisits + 1` times.
    ///
    /// This is the bound on self-correcting loops; it is reported
    /// distinctly from a node failure.
    #[error("Iteration limit ({limit}) exceeded at node: {node}")]
    IterationLimit {
        /// The node whose counter crossed the bound
        node: NodeName,
        /// The configured maximum number of revisits
        limit: u32,
    },

    /// A routing function produced an outcome outside its declared set.
    ///
    /// Treated as a programming error in the graph definition, never a
    /// recoverable runtime condition.
    #[error("Routing function for node '{node}' returned undeclared outcome '{outcome}'")]
    Routing {
        /// The node whose conditional edge misrouted
        node: NodeName,
        /// The undeclared outcome
        outcome: Outcome,
    },

    /// A node's update declared the same field twice.
    #[error("Node '{node}' declared field '{field}' twice in one update")]
    ConflictingUpdate {
        /// The node whose output was malformed
        node: NodeName,
        /// The duplicated field
        field: String,
    },

    /// A referenced node does not exist in the plan.
    ///
    /// Reachable only by resuming a checkpoint against a plan that does not
    /// contain the checkpoint's node.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeName),

    /// No suspended run is parked under the given identifier.
    #[error("No suspended run with id: {0}")]
    UnknownRun(RunId),

    /// The run was cancelled between node executions.
    #[error("Run cancelled")]
    Cancelled,

    /// A checkpoint could not be serialized or restored.
    #[error("Checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
