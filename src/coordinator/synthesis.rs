//! Result synthesis: evidence, conflicts, and summary scores.
//!
//! Synthesis is a pure function of the workflow plan and the collected
//! step results — re-running it over the same inputs yields an identical
//! report. Evidence extraction is pluggable per agent type; everything
//! else is fixed arithmetic.

use crate::worker::WorkerOutput;
use crate::workflow::catalog::{AGENT_COMPOUND, AGENT_LITERATURE};
use crate::workflow::WorkflowPlan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Confidence spread across step results beyond which a conflict is
/// recorded.
pub const CONFLICT_THRESHOLD: f64 = 0.3;

/// Execution time under which a result earns the full speed bonus.
const FAST_EXECUTION_MS: u64 = 60_000;

/// One piece of supporting evidence extracted from a step result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    /// The step whose output contributed this item.
    pub source_step: String,
    /// The agent type that produced the output.
    pub agent_type: String,
    /// Human-readable description.
    pub description: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

/// The aggregate recommendation synthesized from the evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub summary: String,
    /// Mean confidence of the supporting evidence.
    pub confidence: f64,
}

/// A detected disagreement between step results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub description: String,
    /// Step ids contributing to the conflict, in plan order.
    pub sources: Vec<String>,
    /// The confidence spread that triggered detection.
    pub spread: f64,
}

/// The synthesized final result of a composite task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SynthesisReport {
    pub recommendation: Option<Recommendation>,
    pub supporting_evidence: Vec<Evidence>,
    pub conflicts: Vec<Conflict>,
    /// Mean evidence confidence, discounted 0.1 per conflict, floored
    /// at 0.
    pub reliability_score: f64,
    /// Mean confidence over all step results.
    pub overall_confidence: f64,
    /// Mean of per-result quality terms, capped at 1.0.
    pub quality_score: f64,
}

/// Extracts evidence items from one step's output.
pub trait EvidenceExtractor: Send + Sync {
    fn extract(&self, step_id: &str, agent_type: &str, output: &WorkerOutput) -> Vec<Evidence>;
}

/// Literature outputs contribute one item per paper, scored by the
/// paper's reported relevance.
pub struct LiteratureEvidence;

impl EvidenceExtractor for LiteratureEvidence {
    fn extract(&self, step_id: &str, agent_type: &str, output: &WorkerOutput) -> Vec<Evidence> {
        let Some(papers) = output.result["papers"].as_array() else {
            return Vec::new();
        };
        papers
            .iter()
            .map(|paper| Evidence {
                source_step: step_id.to_string(),
                agent_type: agent_type.to_string(),
                description: paper["title"].as_str().unwrap_or("untitled paper").to_string(),
                confidence: paper["relevance"].as_f64().unwrap_or(0.0).clamp(0.0, 1.0),
            })
            .collect()
    }
}

/// Compound outputs contribute a single item derived from the
/// drug-likeness score.
pub struct CompoundEvidence;

impl EvidenceExtractor for CompoundEvidence {
    fn extract(&self, step_id: &str, agent_type: &str, output: &WorkerOutput) -> Vec<Evidence> {
        let score = output.result["drug_likeness"]
            .as_f64()
            .unwrap_or(output.confidence)
            .clamp(0.0, 1.0);
        let compound = output.result["compound"].as_str().unwrap_or("compound");
        vec![Evidence {
            source_step: step_id.to_string(),
            agent_type: agent_type.to_string(),
            description: format!("drug-likeness profile of {}", compound),
            confidence: score,
        }]
    }
}

/// Fallback: one item carrying the output's own confidence.
pub struct GenericEvidence;

impl EvidenceExtractor for GenericEvidence {
    fn extract(&self, step_id: &str, agent_type: &str, output: &WorkerOutput) -> Vec<Evidence> {
        vec![Evidence {
            source_step: step_id.to_string(),
            agent_type: agent_type.to_string(),
            description: format!("{} analysis result", agent_type),
            confidence: output.confidence.clamp(0.0, 1.0),
        }]
    }
}

/// Synthesizes step results into a [`SynthesisReport`].
pub struct SynthesisEngine {
    extractors: HashMap<String, Box<dyn EvidenceExtractor>>,
    fallback: Box<dyn EvidenceExtractor>,
    conflict_threshold: f64,
}

impl Default for SynthesisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisEngine {
    /// Engine with the built-in literature and compound extractors.
    pub fn new() -> Self {
        let mut extractors: HashMap<String, Box<dyn EvidenceExtractor>> = HashMap::new();
        extractors.insert(AGENT_LITERATURE.to_string(), Box::new(LiteratureEvidence));
        extractors.insert(AGENT_COMPOUND.to_string(), Box::new(CompoundEvidence));
        Self {
            extractors,
            fallback: Box::new(GenericEvidence),
            conflict_threshold: CONFLICT_THRESHOLD,
        }
    }

    /// Register an extractor for an agent type, replacing any previous
    /// one.
    pub fn register_extractor(&mut self, agent_type: &str, extractor: Box<dyn EvidenceExtractor>) {
        self.extractors.insert(agent_type.to_string(), extractor);
    }

    /// Build the report. Steps are visited in plan order so the report
    /// is deterministic regardless of map iteration order.
    pub fn synthesize(
        &self,
        plan: &WorkflowPlan,
        results: &HashMap<String, WorkerOutput>,
    ) -> SynthesisReport {
        let mut evidence = Vec::new();
        let mut confidences = Vec::new();
        let mut quality_terms = Vec::new();
        let mut contributing_steps = Vec::new();

        for step in plan.steps() {
            let Some(output) = results.get(&step.step_id) else {
                continue;
            };
            contributing_steps.push(step.step_id.clone());
            confidences.push(output.confidence);

            let speed_bonus = if output.execution_time_ms < FAST_EXECUTION_MS {
                0.3
            } else {
                0.1
            };
            quality_terms.push(output.confidence * 0.6 + speed_bonus + 0.1);

            let extractor = self
                .extractors
                .get(&step.agent_type)
                .unwrap_or(&self.fallback);
            evidence.extend(extractor.extract(&step.step_id, &step.agent_type, output));
        }

        let overall_confidence = mean(&confidences);
        let quality_score = mean(&quality_terms).min(1.0);

        let mut conflicts = Vec::new();
        if confidences.len() > 1 {
            let max = confidences.iter().cloned().fold(f64::MIN, f64::max);
            let min = confidences.iter().cloned().fold(f64::MAX, f64::min);
            let spread = max - min;
            if spread > self.conflict_threshold {
                conflicts.push(Conflict {
                    description: format!(
                        "confidence spread {:.2} across step results exceeds {:.2}",
                        spread, self.conflict_threshold
                    ),
                    sources: contributing_steps.clone(),
                    spread,
                });
            }
        }

        let evidence_confidences: Vec<f64> = evidence.iter().map(|e| e.confidence).collect();
        let mean_evidence_confidence = mean(&evidence_confidences);

        let recommendation = if evidence.is_empty() {
            None
        } else {
            Some(Recommendation {
                summary: format!(
                    "Synthesized {} evidence items from {} analysis steps",
                    evidence.len(),
                    contributing_steps.len()
                ),
                confidence: mean_evidence_confidence,
            })
        };

        let reliability_score =
            (mean_evidence_confidence - 0.1 * conflicts.len() as f64).max(0.0);

        SynthesisReport {
            recommendation,
            supporting_evidence: evidence,
            conflicts,
            reliability_score,
            overall_confidence,
            quality_score,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
