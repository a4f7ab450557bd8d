//! The run loop: invoke, merge, route, bound, suspend.

use crate::checkpoint::{Checkpoint, RunId};
use crate::error::EngineError;
use crate::graph::{Plan, Target};
use crate::node::{NodeName, NodeOutput};
use crate::state::{DuplicateField, State, Update};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-run execution policy.
///
/// Carried by the [`Executor`], never ambient: two executors over the same
/// [`Plan`] may run with different policies.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// How many times a node may *re*-execute within one run. A node runs at
    /// most `max_revisits + 1` times before the run fails with
    /// [`EngineError::IterationLimit`]. Default: 3.
    pub max_revisits: u32,
    /// Maximum time allowed per node invocation. `None` means no timeout.
    /// Default: 30 seconds.
    pub node_timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_revisits: 3,
            node_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Outcome of one execution attempt.
///
/// Suspension is a normal, expected result of an attempt, distinct from
/// failure; failures are reported through `Err(`[`EngineError`]`)` instead.
#[derive(Debug)]
pub enum RunStatus {
    /// The run reached the terminal marker; carries the final state.
    Complete(State),
    /// The run froze awaiting an external decision; carries the snapshot
    /// needed to resume it.
    Suspended(Checkpoint),
}

/// Walks a compiled [`Plan`]: invokes nodes, merges their updates, evaluates
/// conditional edges, enforces the iteration bound, and parks suspended runs
/// until an external decision arrives.
///
/// The executor holds no per-run state beyond the table of suspended
/// checkpoints, so one executor may drive many concurrent runs.
#[derive(Debug, Default)]
pub struct Executor {
    config: RunConfig,
    suspended: Mutex<HashMap<RunId, Checkpoint>>,
}

impl Executor {
    /// Creates an executor with the default [`RunConfig`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor with an explicit policy.
    pub fn with_config(config: RunConfig) -> Self {
        Self {
            config,
            suspended: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the executor's policy.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Executes the plan from its start node against the given initial
    /// state.
    ///
    /// Returns [`RunStatus::Complete`] with the final state,
    /// [`RunStatus::Suspended`] with a checkpoint parked under its run id,
    /// or an [`EngineError`] naming the node that brought the run down.
    pub async fn run(&self, plan: &Plan, state: State) -> Result<RunStatus, EngineError> {
        self.drive(plan, state, plan.start().clone(), HashMap::new(), None)
            .await
    }

    /// Like [`run`](Self::run), but observes the token between node
    /// executions.
    ///
    /// Cancellation is advisory while a node is in flight: the node runs to
    /// completion and its update is merged before the cancellation is
    /// honored, so no partially-applied update is ever discarded silently.
    pub async fn run_cancellable(
        &self,
        plan: &Plan,
        state: State,
        cancel: CancellationToken,
    ) -> Result<RunStatus, EngineError> {
        self.drive(plan, state, plan.start().clone(), HashMap::new(), Some(cancel))
            .await
    }

    /// Resumes a run this executor previously suspended.
    ///
    /// The checkpoint is removed from the suspended table; a resume consumes
    /// it exactly once. The externally-decided `decision` is merged into the
    /// snapshot state, then the *same* node that suspended re-executes with
    /// the decision visible in its input state.
    pub async fn resume(
        &self,
        plan: &Plan,
        run_id: &RunId,
        decision: Update,
    ) -> Result<RunStatus, EngineError> {
        let checkpoint = self
            .suspended
            .lock()
            .await
            .remove(run_id)
            .ok_or_else(|| EngineError::UnknownRun(run_id.clone()))?;
        self.resume_from(plan, checkpoint, decision).await
    }

    /// Resumes from an externally held checkpoint, e.g. one restored with
    /// [`Checkpoint::from_json`] after a process restart.
    pub async fn resume_from(
        &self,
        plan: &Plan,
        checkpoint: Checkpoint,
        decision: Update,
    ) -> Result<RunStatus, EngineError> {
        if !plan.has_node(checkpoint.node.as_str()) {
            return Err(EngineError::NodeNotFound(checkpoint.node));
        }
        let Checkpoint {
            node,
            mut state,
            visits,
            ..
        } = checkpoint;
        apply_update(&mut state, &node, decision)?;
        info!("Resuming run at node '{}'", node);
        self.drive(plan, state, node, visits, None).await
    }

    async fn drive(
        &self,
        plan: &Plan,
        mut state: State,
        mut current: NodeName,
        mut visits: HashMap<NodeName, u32>,
        cancel: Option<CancellationToken>,
    ) -> Result<RunStatus, EngineError> {
        loop {
            if let Some(token) = &cancel {
                if token.is_cancelled() {
                    info!("Run cancelled before node '{}'", current);
                    return Err(EngineError::Cancelled);
                }
            }

            let count = visits.entry(current.clone()).or_insert(0);
            *count += 1;
            if *count > self.config.max_revisits + 1 {
                warn!(
                    "Node '{}' exceeded the iteration limit of {}",
                    current, self.config.max_revisits
                );
                return Err(EngineError::IterationLimit {
                    node: current,
                    limit: self.config.max_revisits,
                });
            }

            let node = plan
                .node(&current)
                .ok_or_else(|| EngineError::NodeNotFound(current.clone()))?;

            let result = match self.config.node_timeout {
                Some(limit) => match timeout(limit, node.run(&state)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Node '{}' timed out", current);
                        return Err(EngineError::Timeout { node: current });
                    }
                },
                None => node.run(&state).await,
            };

            let output = match result {
                Ok(output) => output,
                Err(error) => {
                    warn!("Node '{}' failed: {}", current, error);
                    return Err(EngineError::NodeFailure {
                        node: current,
                        details: error.to_string(),
                    });
                }
            };

            match output {
                NodeOutput::Advance(update) => {
                    apply_update(&mut state, &current, update)?;
                    info!("Node '{}' completed", current);
                }
                NodeOutput::Suspend { update, request } => {
                    apply_update(&mut state, &current, update)?;
                    let checkpoint = Checkpoint {
                        run_id: RunId::new(),
                        node: current.clone(),
                        state,
                        visits,
                        request,
                    };
                    info!(
                        "Run suspended at node '{}' awaiting an external decision",
                        current
                    );
                    self.suspended
                        .lock()
                        .await
                        .insert(checkpoint.run_id.clone(), checkpoint.clone());
                    return Ok(RunStatus::Suspended(checkpoint));
                }
            }

            // Routing is evaluated strictly after the merge, so a
            // conditional edge always sees the fields the node just wrote.
            match plan.route(&current, &state)? {
                Target::End => {
                    info!("Run completed at node '{}'", current);
                    return Ok(RunStatus::Complete(state));
                }
                Target::Node(next) => current = next,
            }
        }
    }
}

fn apply_update(state: &mut State, node: &NodeName, update: Update) -> Result<(), EngineError> {
    state
        .apply(update)
        .map_err(|DuplicateField(field)| EngineError::ConflictingUpdate {
            node: node.clone(),
            field,
        })
}
