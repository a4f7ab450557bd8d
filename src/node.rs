//! The node contract: named units of work over the shared state.

use crate::checkpoint::SuspendRequest;
use crate::state::{State, Update};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Type-safe node name wrapper.
///
/// Provides compile-time safety for node identifiers, preventing typos and
/// mismatched node names at the API level.
///
/// # Examples
///
/// ```
/// use meguru::NodeName;
///
/// let name = NodeName::new("diagnose");
/// assert_eq!(name.as_str(), "diagnose");
///
/// // From trait for ergonomic conversion
/// let name: NodeName = "research".into();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeName(String);

impl NodeName {
    /// Creates a new NodeName
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the node name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for NodeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Failure raised by a node's work function.
///
/// The executor attaches the failing node's name when it propagates this as
/// a terminal run result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct NodeError(String);

impl NodeError {
    /// Creates a new node error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for NodeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for NodeError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// What a node asks the executor to do once its work function returns.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    /// Merge the update into the state and advance along the node's
    /// outgoing edge.
    Advance(Update),
    /// Merge the update, then freeze the run awaiting an external decision.
    /// Resuming re-enters the same node with the decision merged in.
    Suspend {
        /// Fields to merge before the checkpoint is captured.
        update: Update,
        /// What the node wants to do and why it needs sign-off.
        request: SuspendRequest,
    },
}

impl NodeOutput {
    /// Creates an Advance output carrying the given update.
    pub fn advance(update: Update) -> Self {
        Self::Advance(update)
    }

    /// Creates an Advance output that changes nothing.
    pub fn empty() -> Self {
        Self::Advance(Update::new())
    }

    /// Creates a Suspend output.
    pub fn suspend(update: Update, request: SuspendRequest) -> Self {
        Self::Suspend { update, request }
    }
}

/// A unit of work in the graph.
///
/// Implementations must be stateless across invocations: any memory of prior
/// calls lives in the [`State`], not in the node. Collaborators (a search
/// client, a file reader, a model client) are injected at construction time
/// behind whatever narrow interface the node defines; the engine only ever
/// sees this trait.
///
/// # Examples
///
/// ```
/// use meguru::{Node, NodeError, NodeOutput, State, Update};
/// use async_trait::async_trait;
///
/// struct Classify;
///
/// #[async_trait]
/// impl Node for Classify {
///     async fn run(&self, state: &State) -> Result<NodeOutput, NodeError> {
///         let log = state.text("error_log").unwrap_or_default();
///         let label = if log.contains("refused") { "network" } else { "code" };
///         Ok(NodeOutput::advance(Update::new().set("error_type", label)))
///     }
/// }
/// ```
#[async_trait]
pub trait Node: Send + Sync {
    /// Executes the node's work against the current state.
    ///
    /// # Returns
    ///
    /// - `Ok(NodeOutput::Advance(update))` - merge and continue routing
    /// - `Ok(NodeOutput::Suspend { .. })` - merge, checkpoint and pause
    /// - `Err(error)` - the run fails; the engine performs no retries
    async fn run(&self, state: &State) -> Result<NodeOutput, NodeError>;
}

/// Adapter that lets a plain function serve as a node.
///
/// Registered through [`GraphBuilder::add_fn`](crate::GraphBuilder::add_fn);
/// useful for nodes whose work is synchronous and self-contained.
pub struct FnNode<F>(F);

impl<F> FnNode<F>
where
    F: Fn(&State) -> Result<NodeOutput, NodeError> + Send + Sync,
{
    /// Wraps a function as a node.
    pub fn new(work: F) -> Self {
        Self(work)
    }
}

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: Fn(&State) -> Result<NodeOutput, NodeError> + Send + Sync,
{
    async fn run(&self, state: &State) -> Result<NodeOutput, NodeError> {
        (self.0)(state)
    }
}
