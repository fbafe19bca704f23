//! Molecular compound analysis processor.

use crate::error::Result;
use crate::worker::{Analysis, Processor, WorkerInput};
use crate::workflow::catalog::AGENT_COMPOUND;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::simulate_latency;

const ANALYSIS_LATENCY_MS: u64 = 20;

/// Computes (mock) molecular properties and a drug-likeness score.
///
/// Synthesis derives a single piece of evidence from the drug-likeness
/// score of each compound analysis.
#[derive(Debug, Default)]
pub struct CompoundProcessor;

impl CompoundProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Processor for CompoundProcessor {
    async fn process(&self, input: &WorkerInput, cancel: CancellationToken) -> Result<Analysis> {
        simulate_latency(Duration::from_millis(ANALYSIS_LATENCY_MS), &cancel).await?;

        let compound = input.data["compound"].as_str().unwrap_or("unnamed-compound");

        Ok(Analysis::new(
            json!({
                "compound": compound,
                "molecular_weight": 342.4,
                "logp": 2.1,
                "hydrogen_bond_donors": 2,
                "hydrogen_bond_acceptors": 5,
                "rotatable_bonds": 6,
                "lipinski_violations": 0,
                "drug_likeness": 0.78
            }),
            0.82,
        )
        .with_metadata("method", json!("mock-descriptor-model")))
    }

    fn agent_type(&self) -> &str {
        AGENT_COMPOUND
    }
}
