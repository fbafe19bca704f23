//! Conflict detection and score arithmetic over full task runs.

use serde_json::json;

use athanor::coordinator::synthesis::SynthesisEngine;
use athanor::core::{TaskPriority, TaskStatus};
use athanor::workflow::{WorkflowCatalog, WorkflowPlan, WorkflowStep};

use crate::fixtures::{AgentSpec, Harness};

/// Given two steps reporting confidences 0.9 and 0.5
/// When the task is synthesized
/// Then a conflict is recorded (spread 0.4 > 0.3) and the reliability
/// score is the mean evidence confidence minus 0.1
#[tokio::test]
async fn test_conflicting_confidences_detected() {
    let mut catalog = WorkflowCatalog::new();
    catalog.register(
        "disagree",
        WorkflowPlan::new(vec![
            WorkflowStep::new("confident", "sure"),
            WorkflowStep::new("hesitant", "unsure"),
        ])
        .unwrap(),
    );
    let harness = Harness::new(
        2,
        &[
            AgentSpec::new("sure").confidence(0.9),
            AgentSpec::new("unsure").confidence(0.5),
        ],
        catalog,
    );

    let task_id = harness
        .coordinator
        .submit("disagree", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    harness.coordinator.dispatch_ready().await;
    let task = harness.wait_finished(&task_id).await;

    let report = task.final_result.unwrap();
    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert!((conflict.spread - 0.4).abs() < 1e-9);
    assert_eq!(
        conflict.sources,
        vec!["confident".to_string(), "hesitant".to_string()]
    );

    // Generic evidence mirrors the output confidences: mean 0.7.
    let mean_evidence = 0.7;
    assert!((report.reliability_score - (mean_evidence - 0.1)).abs() < 1e-9);
    assert!((report.overall_confidence - 0.7).abs() < 1e-9);
}

/// Given two steps with close confidences
/// When the task is synthesized
/// Then no conflict is recorded and reliability equals the mean
/// evidence confidence
#[tokio::test]
async fn test_agreeing_confidences_no_conflict() {
    let mut catalog = WorkflowCatalog::new();
    catalog.register(
        "agree",
        WorkflowPlan::new(vec![
            WorkflowStep::new("a", "one"),
            WorkflowStep::new("b", "two"),
        ])
        .unwrap(),
    );
    let harness = Harness::new(
        2,
        &[
            AgentSpec::new("one").confidence(0.8),
            AgentSpec::new("two").confidence(0.7),
        ],
        catalog,
    );

    let task_id = harness
        .coordinator
        .submit("agree", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    harness.coordinator.dispatch_ready().await;
    let task = harness.wait_finished(&task_id).await;

    let report = task.final_result.unwrap();
    assert!(report.conflicts.is_empty());
    assert!((report.reliability_score - 0.75).abs() < 1e-9);
}

/// Given a completed task's stored results
/// When synthesis is re-run offline over the same results
/// Then the report is identical to the one attached to the task
#[tokio::test]
async fn test_synthesis_reproducible_from_stored_results() {
    let mut catalog = WorkflowCatalog::new();
    catalog.register(
        "repro",
        WorkflowPlan::new(vec![
            WorkflowStep::new("a", "one").parallel(),
            WorkflowStep::new("b", "two").parallel(),
        ])
        .unwrap(),
    );
    let harness = Harness::new(
        2,
        &[
            AgentSpec::new("one").confidence(0.9),
            AgentSpec::new("two").confidence(0.4),
        ],
        catalog,
    );

    let task_id = harness
        .coordinator
        .submit("repro", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    harness.coordinator.dispatch_ready().await;
    let task = harness.wait_finished(&task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);

    let engine = SynthesisEngine::new();
    let recomputed = engine.synthesize(&task.workflow, &task.results);
    assert_eq!(task.final_result.unwrap(), recomputed);

    // And a second recomputation matches the first.
    let again = engine.synthesize(&task.workflow, &task.results);
    assert_eq!(recomputed, again);
}

/// Given fast steps (well under the speed-bonus threshold)
/// When quality is computed
/// Then each term earns the 0.3 speed bonus
#[tokio::test]
async fn test_quality_score_rewards_fast_steps() {
    let mut catalog = WorkflowCatalog::new();
    catalog.register(
        "fast",
        WorkflowPlan::new(vec![WorkflowStep::new("a", "one")]).unwrap(),
    );
    let harness = Harness::new(2, &[AgentSpec::new("one").confidence(0.5)], catalog);

    let task_id = harness
        .coordinator
        .submit("fast", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    harness.coordinator.dispatch_ready().await;
    let task = harness.wait_finished(&task_id).await;

    let report = task.final_result.unwrap();
    // 0.5 * 0.6 + 0.3 + 0.1
    assert!((report.quality_score - 0.7).abs() < 1e-9);
}

/// Given a task whose steps were all skipped
/// When synthesized
/// Then every score is zero and nothing is recommended
#[tokio::test]
async fn test_all_skipped_scores_zero() {
    let mut catalog = WorkflowCatalog::new();
    catalog.register(
        "ghost",
        WorkflowPlan::new(vec![
            WorkflowStep::new("a", "one")
                .with_dependencies(["missing"])
                .optional(),
            WorkflowStep::new("b", "one")
                .with_dependencies(["also-missing"])
                .optional(),
        ])
        .unwrap(),
    );
    let harness = Harness::new(2, &[AgentSpec::new("one")], catalog);

    let task_id = harness
        .coordinator
        .submit("ghost", json!({}), TaskPriority::Medium)
        .await
        .unwrap();
    harness.coordinator.dispatch_ready().await;
    let task = harness.wait_finished(&task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let report = task.final_result.unwrap();
    assert!(report.supporting_evidence.is_empty());
    assert!(report.recommendation.is_none());
    assert_eq!(report.overall_confidence, 0.0);
    assert_eq!(report.quality_score, 0.0);
    assert_eq!(report.reliability_score, 0.0);
}
