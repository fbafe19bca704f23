//! Cross-reference processor.

use crate::error::Result;
use crate::worker::{Analysis, Processor, WorkerInput};
use crate::workflow::catalog::AGENT_CROSS_REFERENCE;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::simulate_latency;

const CORRELATION_LATENCY_MS: u64 = 10;

/// Correlates findings across earlier analysis steps.
#[derive(Debug, Default)]
pub struct CrossReferenceProcessor;

impl CrossReferenceProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Processor for CrossReferenceProcessor {
    async fn process(&self, input: &WorkerInput, cancel: CancellationToken) -> Result<Analysis> {
        simulate_latency(Duration::from_millis(CORRELATION_LATENCY_MS), &cancel).await?;

        let subject = input.data["query"]
            .as_str()
            .or_else(|| input.data["compound"].as_str())
            .unwrap_or("study subject");

        Ok(Analysis::new(
            json!({
                "subject": subject,
                "correlations": [
                    {
                        "source": "literature",
                        "target": "compound",
                        "strength": 0.71,
                        "note": "reported binding affinity consistent with descriptor profile"
                    },
                    {
                        "source": "compound",
                        "target": "literature",
                        "strength": 0.64,
                        "note": "no contradicting toxicity reports found"
                    }
                ],
                "coverage": 0.67
            }),
            0.75,
        ))
    }

    fn agent_type(&self) -> &str {
        AGENT_CROSS_REFERENCE
    }
}
