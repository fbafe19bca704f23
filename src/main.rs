use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use athanor::config::Config;
use athanor::coordinator::{Coordinator, CoordinatorEvent};
use athanor::core::TaskPriority;
use athanor::worker::Worker;
use athanor::workers::{CompoundProcessor, CrossReferenceProcessor, LiteratureProcessor};
use athanor::workflow::catalog::{
    AGENT_COMPOUND, AGENT_CROSS_REFERENCE, AGENT_LITERATURE,
};
use athanor::workflow::WorkflowCatalog;
use athanor::Result;

/// Athanor - multi-agent research synthesis orchestrator
#[derive(Parser, Debug)]
#[command(name = "athanor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, default_value = "athanor.toml")]
    config: PathBuf,

    /// Task type to submit (see the built-in catalog)
    #[arg(short, long, default_value = "research_synthesis")]
    task_type: String,

    /// Research query passed as the task input
    #[arg(short, long, default_value = "BRCA1 kinase inhibitors")]
    query: String,

    /// Priority: low, medium, high, or urgent
    #[arg(short, long, default_value = "medium")]
    priority: String,
}

fn parse_priority(s: &str) -> TaskPriority {
    match s {
        "low" => TaskPriority::Low,
        "high" => TaskPriority::High,
        "urgent" => TaskPriority::Urgent,
        _ => TaskPriority::Medium,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let (worker_tx, mut worker_rx) = tokio::sync::mpsc::channel(100);
    // Worker events are logged by the workers themselves; keep the
    // channel from backing up.
    tokio::spawn(async move { while worker_rx.recv().await.is_some() {} });

    let mut registry = HashMap::new();
    registry.insert(
        AGENT_LITERATURE.to_string(),
        Arc::new(Worker::new(
            AGENT_LITERATURE,
            config.worker(AGENT_LITERATURE),
            Arc::new(LiteratureProcessor::new()),
            worker_tx.clone(),
        )),
    );
    registry.insert(
        AGENT_COMPOUND.to_string(),
        Arc::new(Worker::new(
            AGENT_COMPOUND,
            config.worker(AGENT_COMPOUND),
            Arc::new(CompoundProcessor::new()),
            worker_tx.clone(),
        )),
    );
    registry.insert(
        AGENT_CROSS_REFERENCE.to_string(),
        Arc::new(Worker::new(
            AGENT_CROSS_REFERENCE,
            config.worker(AGENT_CROSS_REFERENCE),
            Arc::new(CrossReferenceProcessor::new()),
            worker_tx,
        )),
    );

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(100);
    let coordinator = Arc::new(Coordinator::new(
        config.coordinator.clone(),
        registry,
        WorkflowCatalog::builtin(),
        event_tx,
    )?);

    let loop_handle = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run().await }
    });

    let task_id = coordinator
        .submit(
            &cli.task_type,
            serde_json::json!({ "query": cli.query }),
            parse_priority(&cli.priority),
        )
        .await?;

    while let Some(event) = event_rx.recv().await {
        match event {
            CoordinatorEvent::TaskCompleted { task_id: id } if id == task_id => {
                if let Some(task) = coordinator.task_status(&task_id).await {
                    println!("{}", serde_json::to_string_pretty(&task)?);
                }
                break;
            }
            CoordinatorEvent::TaskFailed { task_id: id, error } if id == task_id => {
                eprintln!("task {} failed: {}", id.short(), error);
                break;
            }
            _ => {}
        }
    }

    coordinator.shutdown(Duration::from_secs(2)).await;
    loop_handle.await.map_err(|e| {
        athanor::Error::TaskJoin(e.to_string())
    })?;
    Ok(())
}
