use meguru::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let plan = GraphBuilder::new()
        .add_fn("fetch", |_state: &State| {
            println!("Fetching data...");
            Ok(NodeOutput::advance(
                Update::new().set("raw", "sample payload"),
            ))
        })
        .add_fn("summarize", |state: &State| {
            println!("Summarizing...");
            let raw = state.text("raw").unwrap_or_default();
            Ok(NodeOutput::advance(
                Update::new().set("summary", format!("{} ({} bytes)", raw, raw.len())),
            ))
        })
        .add_edge("fetch", "summarize")
        .add_edge("summarize", END)
        .start_with("fetch")
        .build()?;

    let executor = Executor::new();
    match executor.run(&plan, State::new()).await {
        Ok(RunStatus::Complete(state)) => {
            println!("Pipeline completed");
            println!("Summary: {}", state.text("summary").unwrap_or("n/a"));
        }
        Ok(RunStatus::Suspended(checkpoint)) => {
            println!("Pipeline paused: {}", checkpoint.request.action);
        }
        Err(error) => println!("Pipeline failed: {error}"),
    }

    Ok(())
}
