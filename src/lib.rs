//! # Meguru (巡)
//!
//! A small engine for cyclic, stateful workflows in Rust.
//!
//! The name "Meguru" (巡) means "to go around" in Japanese, after the
//! engine's defining feature: a later step may route back to an earlier
//! one, under an explicit iteration bound, until the pipeline corrects
//! itself.
//!
//! ## Features
//!
//! - **Compile-time graph validation**: dangling edges, orphan nodes and
//!   duplicate names are [`ValidationError`]s at build time, not surprises
//!   at run time
//! - **Conditional routing**: per-edge routing functions choose the next
//!   node from a closed, declared outcome set, evaluated against fresh state
//! - **Bounded loops**: a per-node iteration bound turns runaway
//!   self-correction cycles into a distinct [`EngineError::IterationLimit`]
//! - **Suspend/resume**: a node can freeze the run awaiting an external
//!   decision; the serializable [`Checkpoint`] survives a process restart
//! - **Async first**: nodes are `async` via `async-trait`, with per-node
//!   timeouts and cooperative cancellation between nodes
//!
//! ## Quick Start
//!
//! ```rust
//! use meguru::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plan = GraphBuilder::new()
//!     .add_fn("greet", |_state: &State| {
//!         Ok(NodeOutput::advance(Update::new().set("greeting", "hello")))
//!     })
//!     .add_edge("greet", END)
//!     .start_with("greet")
//!     .build()?;
//!
//! let executor = Executor::new();
//! match executor.run(&plan, State::new()).await? {
//!     RunStatus::Complete(state) => assert_eq!(state.text("greeting"), Some("hello")),
//!     RunStatus::Suspended(checkpoint) => println!("paused: {}", checkpoint.request.action),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Loops and Conditional Edges
//!
//! A routing function sees the state *after* the node's update has been
//! merged, so a field written by a node can steer the very next transition:
//!
//! ```rust
//! use meguru::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plan = GraphBuilder::new()
//!     .add_fn("probe", |state: &State| {
//!         let tries = state.number("tries").unwrap_or(0.0);
//!         Ok(NodeOutput::advance(Update::new().set("tries", tries + 1.0)))
//!     })
//!     .add_conditional_edge(
//!         "probe",
//!         |state: &State| {
//!             if state.number("tries").unwrap_or(0.0) < 3.0 {
//!                 "again".into()
//!             } else {
//!                 "done".into()
//!             }
//!         },
//!         [("again", "probe"), ("done", END)],
//!     )
//!     .start_with("probe")
//!     .build()?;
//!
//! let executor = Executor::new();
//! match executor.run(&plan, State::new()).await? {
//!     RunStatus::Complete(state) => assert_eq!(state.number("tries"), Some(3.0)),
//!     RunStatus::Suspended(_) => {}
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Human-in-the-loop Checkpoints
//!
//! A node may suspend the run instead of acting. The executor parks a
//! [`Checkpoint`] under a stable [`RunId`](crate::RunId); resuming merges the
//! external decision into state and re-enters the *same* node, whose own
//! logic branches on it:
//!
//! ```rust
//! use meguru::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plan = GraphBuilder::new()
//!     .add_fn("apply_fix", |state: &State| {
//!         match state.flag("approved") {
//!             None => Ok(NodeOutput::suspend(
//!                 Update::new(),
//!                 SuspendRequest::new("restart the api gateway", "interrupts live traffic"),
//!             )),
//!             Some(true) => Ok(NodeOutput::advance(Update::new().set("status", "applied"))),
//!             Some(false) => Ok(NodeOutput::advance(Update::new().set("status", "declined"))),
//!         }
//!     })
//!     .add_edge("apply_fix", END)
//!     .start_with("apply_fix")
//!     .build()?;
//!
//! let executor = Executor::new();
//! let checkpoint = match executor.run(&plan, State::new()).await? {
//!     RunStatus::Suspended(checkpoint) => checkpoint,
//!     RunStatus::Complete(_) => unreachable!("the first attempt must pause"),
//! };
//!
//! let decision = Update::new().set("approved", true);
//! match executor.resume(&plan, &checkpoint.run_id, decision).await? {
//!     RunStatus::Complete(state) => assert_eq!(state.text("status"), Some("applied")),
//!     RunStatus::Suspended(_) => unreachable!("the decision was supplied"),
//! }
//! # Ok(())
//! # }
//! ```

mod checkpoint;
mod error;
mod executor;
mod graph;
mod node;
mod state;

pub mod prelude;

pub use checkpoint::{Checkpoint, RunId, SuspendRequest};
pub use error::{EngineError, ValidationError};
pub use executor::{Executor, RunConfig, RunStatus};
pub use graph::{GraphBuilder, Outcome, Plan, END};
pub use node::{FnNode, Node, NodeError, NodeName, NodeOutput};
pub use state::{DuplicateField, State, Update, Value};

/// Macro to define a node with minimal boilerplate
///
/// This macro creates a node struct with:
/// - `const NAME: &'static str` - compile-time node name
/// - `Debug` derive
/// - `Default` implementation
///
/// # Example
///
/// ```rust
/// use meguru::define_node;
///
/// define_node!(Diagnose);
/// assert_eq!(Diagnose::NAME, "Diagnose");
/// ```
#[macro_export]
macro_rules! define_node {
    ($name:ident) => {
        #[derive(Debug)]
        pub struct $name;

        impl $name {
            /// Node name as a compile-time constant
            #[allow(dead_code)]
            pub const NAME: &'static str = stringify!($name);
        }

        impl Default for $name {
            fn default() -> Self {
                Self
            }
        }
    };
}
