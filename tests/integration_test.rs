use meguru::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn unwrap_complete(status: RunStatus) -> State {
    match status {
        RunStatus::Complete(state) => state,
        RunStatus::Suspended(checkpoint) => {
            panic!("unexpected suspension at '{}'", checkpoint.node)
        }
    }
}

fn unwrap_suspended(status: RunStatus) -> Checkpoint {
    match status {
        RunStatus::Suspended(checkpoint) => checkpoint,
        RunStatus::Complete(_) => panic!("expected a suspension"),
    }
}

/// Scenario A: a start node wired straight to the terminal marker completes
/// in exactly one execution and changes nothing beyond its declared update.
#[tokio::test]
async fn test_two_node_graph_completes_in_one_execution() {
    let executions = Arc::new(AtomicU32::new(0));
    let counter = executions.clone();

    let plan = GraphBuilder::new()
        .add_fn("start", move |_state: &State| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(NodeOutput::advance(Update::new().set("started", true)))
        })
        .add_edge("start", END)
        .start_with("start")
        .build()
        .unwrap();

    let initial = State::new().with("input", "untouched");
    let executor = Executor::new();
    let state = unwrap_complete(executor.run(&plan, initial).await.unwrap());

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(state.flag("started"), Some(true));
    assert_eq!(state.text("input"), Some("untouched"));
    assert_eq!(state.len(), 2);
}

/// Scenario B: A -> B -> conditional(A | END) where B always loops back.
/// With a bound of 2 revisits, A executes exactly 3 times and the run fails
/// with the dedicated iteration-limit error.
#[tokio::test]
async fn test_cyclic_graph_stops_at_iteration_limit() {
    let executions = Arc::new(AtomicU32::new(0));
    let counter = executions.clone();

    let plan = GraphBuilder::new()
        .add_fn("a", move |_state: &State| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(NodeOutput::empty())
        })
        .add_fn("b", |_state: &State| Ok(NodeOutput::empty()))
        .add_edge("a", "b")
        .add_conditional_edge(
            "b",
            |_state: &State| Outcome::new("loop"),
            [("loop", "a"), ("finish", END)],
        )
        .start_with("a")
        .build()
        .unwrap();

    let executor = Executor::with_config(RunConfig {
        max_revisits: 2,
        ..RunConfig::default()
    });
    let error = executor.run(&plan, State::new()).await.unwrap_err();

    match error {
        EngineError::IterationLimit { node, limit } => {
            assert_eq!(node.as_str(), "a");
            assert_eq!(limit, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(executions.load(Ordering::SeqCst), 3);
}

/// Scenario C: a checkpointing node suspends with its own name on the
/// checkpoint; resuming with an approval re-executes that same node with
/// the decision visible in its input state.
#[tokio::test]
async fn test_checkpointing_node_suspends_and_resumes_in_place() {
    let plan = approval_plan();
    let executor = Executor::new();

    let checkpoint = unwrap_suspended(
        executor
            .run(&plan, State::new().with("fix", "restart worker"))
            .await
            .unwrap(),
    );
    assert_eq!(checkpoint.node.as_str(), "apply_fix");
    assert_eq!(checkpoint.request.action, "restart worker");

    let state = unwrap_complete(
        executor
            .resume(&plan, &checkpoint.run_id, Update::new().set("approved", true))
            .await
            .unwrap(),
    );
    assert_eq!(state.text("status"), Some("applied"));
    assert_eq!(state.flag("approved"), Some(true));
}

/// Suspend-then-resume is observationally identical to running straight
/// through with the decision already present in the initial state.
#[tokio::test]
async fn test_resume_matches_straight_through_run() {
    let plan = approval_plan();
    let executor = Executor::new();

    let initial = State::new().with("fix", "restart worker");

    let checkpoint = unwrap_suspended(executor.run(&plan, initial.clone()).await.unwrap());
    let resumed = unwrap_complete(
        executor
            .resume(&plan, &checkpoint.run_id, Update::new().set("approved", false))
            .await
            .unwrap(),
    );

    let straight = unwrap_complete(
        executor
            .run(&plan, initial.with("approved", false))
            .await
            .unwrap(),
    );

    assert_eq!(resumed, straight);
}

/// A checkpoint survives serialization: resuming the restored record
/// continues exactly like resuming the original.
#[tokio::test]
async fn test_checkpoint_round_trip_resumes_identically() {
    let plan = approval_plan();
    let executor = Executor::new();

    let checkpoint = unwrap_suspended(
        executor
            .run(&plan, State::new().with("fix", "restart worker"))
            .await
            .unwrap(),
    );

    let restored = Checkpoint::from_json(&checkpoint.to_json().unwrap()).unwrap();
    assert_eq!(restored, checkpoint);

    // Resume through the restart path, as a fresh process would.
    let other = Executor::new();
    let state = unwrap_complete(
        other
            .resume_from(&plan, restored, Update::new().set("approved", true))
            .await
            .unwrap(),
    );
    assert_eq!(state.text("status"), Some("applied"));
}

/// A suspension's partial update is merged before the checkpoint is
/// captured, so the snapshot already reflects it.
#[tokio::test]
async fn test_suspension_merges_partial_update_before_checkpoint() {
    let plan = GraphBuilder::new()
        .add_fn("stage", |state: &State| {
            if state.flag("approved").is_some() {
                Ok(NodeOutput::advance(Update::new().set("status", "done")))
            } else {
                Ok(NodeOutput::suspend(
                    Update::new().set("staged", true),
                    SuspendRequest::new("stage the rollout", "reversible"),
                ))
            }
        })
        .add_edge("stage", END)
        .start_with("stage")
        .build()
        .unwrap();

    let executor = Executor::new();
    let checkpoint = unwrap_suspended(executor.run(&plan, State::new()).await.unwrap());
    assert_eq!(checkpoint.state.flag("staged"), Some(true));
}

/// A routing function stepping outside its declared outcome set fails the
/// run with a routing error, never an unhandled crash.
#[tokio::test]
async fn test_undeclared_outcome_is_a_routing_error() {
    let plan = GraphBuilder::new()
        .add_fn("choose", |_state: &State| Ok(NodeOutput::empty()))
        .add_fn("next", |_state: &State| Ok(NodeOutput::empty()))
        .add_conditional_edge(
            "choose",
            |_state: &State| Outcome::new("sideways"),
            [("onward", "next")],
        )
        .add_edge("next", END)
        .start_with("choose")
        .build()
        .unwrap();

    let executor = Executor::new();
    let error = executor.run(&plan, State::new()).await.unwrap_err();
    match error {
        EngineError::Routing { node, outcome } => {
            assert_eq!(node.as_str(), "choose");
            assert_eq!(outcome.as_str(), "sideways");
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Fields a node does not mention keep their prior values across merges.
#[tokio::test]
async fn test_merge_preserves_untouched_fields() {
    let plan = GraphBuilder::new()
        .add_fn("first", |_state: &State| {
            Ok(NodeOutput::advance(Update::new().set("a", 1.0)))
        })
        .add_fn("second", |_state: &State| {
            Ok(NodeOutput::advance(Update::new().set("b", 2.0)))
        })
        .add_edge("first", "second")
        .add_edge("second", END)
        .start_with("first")
        .build()
        .unwrap();

    let executor = Executor::new();
    let state = unwrap_complete(
        executor
            .run(&plan, State::new().with("seed", "kept"))
            .await
            .unwrap(),
    );

    assert_eq!(state.text("seed"), Some("kept"));
    assert_eq!(state.number("a"), Some(1.0));
    assert_eq!(state.number("b"), Some(2.0));
}

/// An orphan node is a compile-time error, not a silent drop.
#[test]
fn test_orphan_node_fails_compilation() {
    let result = GraphBuilder::new()
        .add_fn("start", |_state: &State| Ok(NodeOutput::empty()))
        .add_fn("orphaned_refinement", |_state: &State| Ok(NodeOutput::empty()))
        .add_edge("start", END)
        .add_edge("orphaned_refinement", "start")
        .start_with("start")
        .build();

    assert_eq!(
        result.err(),
        Some(ValidationError::Unreachable(NodeName::new(
            "orphaned_refinement"
        )))
    );
}

/// Concurrent runs over one shared plan never observe each other's state.
#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let plan = Arc::new(
        GraphBuilder::new()
            .add_fn("echo", |state: &State| {
                let input = state.text("input").unwrap_or_default().to_string();
                Ok(NodeOutput::advance(Update::new().set("output", input)))
            })
            .add_edge("echo", END)
            .start_with("echo")
            .build()
            .unwrap(),
    );
    let executor = Arc::new(Executor::new());

    let mut handles = Vec::new();
    for index in 0..8 {
        let plan = plan.clone();
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let input = format!("incident-{index}");
            let state = unwrap_complete(
                executor
                    .run(&plan, State::new().with("input", input.as_str()))
                    .await
                    .unwrap(),
            );
            assert_eq!(state.text("output"), Some(input.as_str()));
            assert_eq!(state.len(), 2);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

/// The confidence-driven refine loop: a solver whose confidence stays low
/// routes back to research until the bound trips.
#[tokio::test]
async fn test_low_confidence_refine_loop_is_bounded() {
    let plan = GraphBuilder::new()
        .add_fn("research", |state: &State| {
            let passes = state.number("passes").unwrap_or(0.0);
            Ok(NodeOutput::advance(Update::new().set("passes", passes + 1.0)))
        })
        .add_fn("solve", |_state: &State| {
            Ok(NodeOutput::advance(Update::new().set("confidence", 0.1)))
        })
        .add_edge("research", "solve")
        .add_conditional_edge(
            "solve",
            |state: &State| {
                if state.number("confidence").unwrap_or(0.0) < 0.5 {
                    "refine".into()
                } else {
                    "end".into()
                }
            },
            [("refine", "research"), ("end", END)],
        )
        .start_with("research")
        .build()
        .unwrap();

    let executor = Executor::with_config(RunConfig {
        max_revisits: 1,
        ..RunConfig::default()
    });
    let error = executor.run(&plan, State::new()).await.unwrap_err();
    assert!(matches!(error, EngineError::IterationLimit { .. }));
}

/// Builds the single-node approval graph used by the checkpoint tests: the
/// node suspends until "approved" is present, then branches on it.
fn approval_plan() -> Plan {
    GraphBuilder::new()
        .add_fn("apply_fix", |state: &State| {
            let action = state.text("fix").unwrap_or("unspecified fix").to_string();
            match state.flag("approved") {
                None => Ok(NodeOutput::suspend(
                    Update::new(),
                    SuspendRequest::new(action, "may interrupt live traffic"),
                )),
                Some(true) => Ok(NodeOutput::advance(Update::new().set("status", "applied"))),
                Some(false) => Ok(NodeOutput::advance(Update::new().set("status", "declined"))),
            }
        })
        .add_edge("apply_fix", END)
        .start_with("apply_fix")
        .build()
        .unwrap()
}
