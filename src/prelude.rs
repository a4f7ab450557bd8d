//! Commonly used types and traits

pub use crate::checkpoint::{Checkpoint, RunId, SuspendRequest};
pub use crate::define_node;
pub use crate::error::{EngineError, ValidationError};
pub use crate::executor::{Executor, RunConfig, RunStatus};
pub use crate::graph::{GraphBuilder, Outcome, Plan, END};
pub use crate::node::{Node, NodeError, NodeName, NodeOutput};
pub use crate::state::{State, Update, Value};
