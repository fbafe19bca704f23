//! Queue ordering guarantees.

use serde_json::json;
use std::time::Duration;

use athanor::coordinator::CoordinatorEvent;
use athanor::core::{TaskId, TaskPriority};
use athanor::workflow::{WorkflowCatalog, WorkflowPlan, WorkflowStep};

use crate::fixtures::{AgentSpec, Harness};

fn single_step_catalog() -> WorkflowCatalog {
    let mut catalog = WorkflowCatalog::new();
    catalog.register(
        "single",
        WorkflowPlan::new(vec![WorkflowStep::new("only", "alpha")]).unwrap(),
    );
    catalog
}

/// Collect the order in which tasks start, by watching TaskStarted
/// events until `expected` have been seen.
async fn started_order(harness: &mut Harness, expected: usize) -> Vec<TaskId> {
    let mut order = Vec::new();
    while order.len() < expected {
        match tokio::time::timeout(Duration::from_secs(5), harness.event_rx.recv()).await {
            Ok(Some(CoordinatorEvent::TaskStarted { task_id })) => order.push(task_id),
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => panic!("event stream ended before {} starts", expected),
        }
    }
    order
}

/// Given tasks of every priority submitted in scrambled order
/// When the scheduler drains the queue with a ceiling of 1
/// Then tasks start urgent-first, high, medium, then low
#[tokio::test]
async fn test_priority_tiers_dispatch_in_order() {
    let mut harness = Harness::new(1, &[AgentSpec::new("alpha").delay_ms(10)], single_step_catalog());

    let medium = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    let low = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::Low)
        .await
        .unwrap();
    let urgent = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::Urgent)
        .await
        .unwrap();
    let high = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::High)
        .await
        .unwrap();

    let coordinator = std::sync::Arc::clone(&harness.coordinator);
    let loop_handle = tokio::spawn(async move { coordinator.run().await });

    let order = started_order(&mut harness, 4).await;
    assert_eq!(order, vec![urgent, high, medium, low]);

    harness.coordinator.shutdown(Duration::from_millis(200)).await;
    loop_handle.await.unwrap();
}

/// Given several tasks of the same priority
/// When the queue drains
/// Then they start in submission order (stable FIFO within a tier)
#[tokio::test]
async fn test_fifo_within_equal_priority() {
    let mut harness = Harness::new(1, &[AgentSpec::new("alpha").delay_ms(10)], single_step_catalog());

    let mut submitted = Vec::new();
    for _ in 0..6 {
        submitted.push(
            harness
                .coordinator
                .submit("single", json!({}), TaskPriority::Medium)
                .await
                .unwrap(),
        );
    }

    let coordinator = std::sync::Arc::clone(&harness.coordinator);
    let loop_handle = tokio::spawn(async move { coordinator.run().await });

    let order = started_order(&mut harness, 6).await;
    assert_eq!(order, submitted);

    harness.coordinator.shutdown(Duration::from_millis(200)).await;
    loop_handle.await.unwrap();
}

/// Given equal-priority tasks interleaved with a higher tier
/// When the queue drains
/// Then the higher tier cuts ahead while FIFO holds inside each tier
#[tokio::test]
async fn test_interleaved_tiers_keep_fifo() {
    let mut harness = Harness::new(1, &[AgentSpec::new("alpha").delay_ms(10)], single_step_catalog());

    let m1 = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    let h1 = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::High)
        .await
        .unwrap();
    let m2 = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    let h2 = harness
        .coordinator
        .submit("single", json!({}), TaskPriority::High)
        .await
        .unwrap();

    let coordinator = std::sync::Arc::clone(&harness.coordinator);
    let loop_handle = tokio::spawn(async move { coordinator.run().await });

    let order = started_order(&mut harness, 4).await;
    assert_eq!(order, vec![h1, h2, m1, m2]);

    harness.coordinator.shutdown(Duration::from_millis(200)).await;
    loop_handle.await.unwrap();
}
