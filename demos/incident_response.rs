//! An incident-response pipeline: diagnose an error log, research it (looping
//! until every query is answered), audit the code, propose a fix, and pause
//! for human sign-off before anything risky happens.

use async_trait::async_trait;
use meguru::prelude::*;
use std::sync::Arc;

/// Narrow capability interface for the research collaborator. The engine
/// never sees it; only the node that owns it does.
trait KnowledgeSource: Send + Sync {
    fn lookup(&self, query: &str) -> String;
}

struct CannedKnowledge;

impl KnowledgeSource for CannedKnowledge {
    fn lookup(&self, query: &str) -> String {
        format!("notes on '{query}': seen before, usually a config issue")
    }
}

define_node!(Diagnose);

#[async_trait]
impl Node for Diagnose {
    async fn run(&self, state: &State) -> Result<NodeOutput, NodeError> {
        let log = state
            .text("error_log")
            .ok_or_else(|| NodeError::new("no error log to diagnose"))?;

        let error_type = if log.contains("connection refused") {
            "network"
        } else if log.contains("out of memory") {
            "resource"
        } else {
            "code"
        };
        println!("[diagnose] classified as '{error_type}'");

        let queries = vec![
            format!("{error_type} failure causes"),
            format!("how to fix: {}", log.lines().next().unwrap_or(log)),
        ];
        Ok(NodeOutput::advance(
            Update::new()
                .set("error_type", error_type)
                .set("search_queries", queries),
        ))
    }
}

/// Answers one open query per pass; the conditional edge loops it until all
/// queries have findings.
struct Research {
    knowledge: Arc<dyn KnowledgeSource>,
}

impl Research {
    const NAME: &'static str = "Research";
}

#[async_trait]
impl Node for Research {
    async fn run(&self, state: &State) -> Result<NodeOutput, NodeError> {
        let queries = state.list("search_queries").unwrap_or_default();
        let mut findings: Vec<Value> = state.list("findings").unwrap_or_default().to_vec();

        if let Some(query) = queries.get(findings.len()).and_then(Value::as_text) {
            println!("[research] looking up: {query}");
            findings.push(Value::Text(self.knowledge.lookup(query)));
        }
        Ok(NodeOutput::advance(Update::new().set("findings", findings)))
    }
}

fn should_continue_research(state: &State) -> Outcome {
    let queries = state.list("search_queries").map_or(0, <[Value]>::len);
    let findings = state.list("findings").map_or(0, <[Value]>::len);
    if findings < queries {
        "research".into()
    } else {
        "audit".into()
    }
}

define_node!(Audit);

#[async_trait]
impl Node for Audit {
    async fn run(&self, state: &State) -> Result<NodeOutput, NodeError> {
        let error_type = state.text("error_type").unwrap_or("unknown");
        println!("[audit] scanning code paths related to '{error_type}' errors");
        Ok(NodeOutput::advance(Update::new().set(
            "code_context",
            format!("config loader touches the {error_type} layer"),
        )))
    }
}

define_node!(Solve);

#[async_trait]
impl Node for Solve {
    async fn run(&self, state: &State) -> Result<NodeOutput, NodeError> {
        let findings = state.list("findings").map_or(0, <[Value]>::len);
        let confidence = (0.35 + 0.25 * findings as f64).min(0.9);
        println!(
            "[solve] proposing a fix with confidence {:.0}%",
            confidence * 100.0
        );

        let solution = "restart the affected service after correcting its config";
        Ok(NodeOutput::advance(
            Update::new()
                .set("proposed_solution", solution)
                .set("confidence", confidence)
                .set("needs_approval", solution.contains("restart")),
        ))
    }
}

fn review_solution(state: &State) -> Outcome {
    if state.number("confidence").unwrap_or(0.0) < 0.5 {
        "refine".into()
    } else if state.flag("needs_approval").unwrap_or(false) {
        "approve".into()
    } else {
        "end".into()
    }
}

define_node!(HumanApproval);

#[async_trait]
impl Node for HumanApproval {
    async fn run(&self, state: &State) -> Result<NodeOutput, NodeError> {
        match state.flag("approved") {
            None => {
                let action = state.text("proposed_solution").unwrap_or("unknown action");
                Ok(NodeOutput::suspend(
                    Update::new(),
                    SuspendRequest::new(action, "restarts interrupt live traffic"),
                ))
            }
            Some(true) => Ok(NodeOutput::advance(Update::new().set("status", "applied"))),
            Some(false) => Ok(NodeOutput::advance(Update::new().set("status", "declined"))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let knowledge: Arc<dyn KnowledgeSource> = Arc::new(CannedKnowledge);

    let plan = GraphBuilder::new()
        .add_node(Diagnose::NAME, Diagnose)
        .add_node(Research::NAME, Research { knowledge })
        .add_node(Audit::NAME, Audit)
        .add_node(Solve::NAME, Solve)
        .add_node(HumanApproval::NAME, HumanApproval)
        .add_edge(Diagnose::NAME, Research::NAME)
        .add_conditional_edge(
            Research::NAME,
            should_continue_research,
            [("research", Research::NAME), ("audit", Audit::NAME)],
        )
        .add_edge(Audit::NAME, Solve::NAME)
        .add_conditional_edge(
            Solve::NAME,
            review_solution,
            [
                ("refine", Research::NAME),
                ("approve", HumanApproval::NAME),
                ("end", END),
            ],
        )
        .add_edge(HumanApproval::NAME, END)
        .start_with(Diagnose::NAME)
        .build()?;

    let initial = State::new().with(
        "error_log",
        "connection refused: could not reach postgres on :5432",
    );

    let executor = Executor::new();
    let status = executor.run(&plan, initial).await?;

    let final_state = match status {
        RunStatus::Complete(state) => state,
        RunStatus::Suspended(checkpoint) => {
            println!();
            println!("HUMAN APPROVAL REQUIRED");
            println!("  action: {}", checkpoint.request.action);
            println!("  impact: {}", checkpoint.request.impact);
            println!("  approving...");
            println!();

            let decision = Update::new().set("approved", true);
            match executor.resume(&plan, &checkpoint.run_id, decision).await? {
                RunStatus::Complete(state) => state,
                RunStatus::Suspended(_) => return Err("still suspended after approval".into()),
            }
        }
    };

    println!();
    println!("INVESTIGATION SUMMARY");
    println!(
        "  error type: {}",
        final_state.text("error_type").unwrap_or("unknown")
    );
    println!(
        "  confidence: {:.0}%",
        final_state.number("confidence").unwrap_or(0.0) * 100.0
    );
    println!(
        "  solution:   {}",
        final_state.text("proposed_solution").unwrap_or("n/a")
    );
    println!(
        "  status:     {}",
        final_state.text("status").unwrap_or("n/a")
    );

    Ok(())
}
