//! Literature search processor.

use crate::error::Result;
use crate::worker::{Analysis, Processor, WorkerInput};
use crate::workflow::catalog::AGENT_LITERATURE;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::simulate_latency;

const SEARCH_LATENCY_MS: u64 = 15;

/// Searches a (mock) literature corpus and scores hits by relevance.
///
/// Each returned paper carries its own relevance score; synthesis turns
/// every hit into one piece of supporting evidence.
#[derive(Debug, Default)]
pub struct LiteratureProcessor;

impl LiteratureProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Processor for LiteratureProcessor {
    async fn process(&self, input: &WorkerInput, cancel: CancellationToken) -> Result<Analysis> {
        simulate_latency(Duration::from_millis(SEARCH_LATENCY_MS), &cancel).await?;

        let query = input.data["query"].as_str().unwrap_or("unspecified");
        let papers = json!([
            {
                "title": "Selective kinase inhibition in tumor suppressor pathways",
                "authors": ["Okafor N.", "Lindqvist M."],
                "year": 2023,
                "doi": "10.1000/demo.2023.0041",
                "relevance": 0.92
            },
            {
                "title": "High-throughput screening of small-molecule binding affinity",
                "authors": ["Tanaka R.", "Mbeki S.", "Hall J."],
                "year": 2022,
                "doi": "10.1000/demo.2022.0187",
                "relevance": 0.81
            },
            {
                "title": "Off-target effects in polypharmacology: a systematic review",
                "authors": ["Durand C."],
                "year": 2024,
                "doi": "10.1000/demo.2024.0009",
                "relevance": 0.74
            }
        ]);

        Ok(Analysis::new(
            json!({
                "query": query,
                "papers": papers,
                "total_hits": 3
            }),
            0.85,
        )
        .with_metadata("source", json!("mock-corpus")))
    }

    fn agent_type(&self) -> &str {
        AGENT_LITERATURE
    }
}
