//! Search state: candidate lineage, score ledger, and budget accounting.
//!
//! Exclusively owned and mutated by the search controller; concurrent
//! evaluations report back through joined futures, never by touching this
//! state directly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::eval::EvalResult;

/// Phase of one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Initial candidate supplied, no evaluations yet.
    Seeded,
    /// Budget remains; generations are being evaluated and mutated.
    Optimizing,
    /// Budget reached zero; best candidate selected.
    Exhausted,
}

/// A candidate skill and its lineage.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Uuid,
    pub text: String,
    /// Generation index; the seed is generation 0.
    pub generation: u32,
    pub parent: Option<Uuid>,
    /// Digest of the feedback that produced this candidate (empty for the seed).
    pub feedback_digest: String,
}

/// A candidate together with every evaluation recorded for it.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub candidate: Candidate,
    pub results: Vec<EvalResult>,
}

impl CandidateRecord {
    /// Mean score across recorded evaluations, 0.0 when unevaluated.
    pub fn mean_score(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(|r| r.score).sum::<f64>() / self.results.len() as f64
    }

    /// Fraction of recorded evaluations that fully resolved their task.
    pub fn resolve_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().filter(|r| r.resolved()).count() as f64 / self.results.len() as f64
    }
}

/// Process-scoped state for one optimization run.
#[derive(Debug)]
pub struct SearchState {
    phase: SearchPhase,
    budget: usize,
    evals_used: usize,
    generation: u32,
    frontier_size: usize,
    records: Vec<CandidateRecord>,
}

impl SearchState {
    /// Initialize with a seed candidate (possibly empty text).
    pub fn new(budget: usize, frontier_size: usize, seed_text: String) -> Self {
        let seed = Candidate {
            id: Uuid::new_v4(),
            text: seed_text,
            generation: 0,
            parent: None,
            feedback_digest: String::new(),
        };
        Self {
            phase: SearchPhase::Seeded,
            budget,
            evals_used: 0,
            generation: 0,
            frontier_size: frontier_size.max(1),
            records: vec![CandidateRecord {
                candidate: seed,
                results: Vec::new(),
            }],
        }
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn begin_optimizing(&mut self) {
        self.phase = SearchPhase::Optimizing;
    }

    pub fn exhaust(&mut self) {
        self.phase = SearchPhase::Exhausted;
    }

    /// Evaluations not yet issued.
    pub fn remaining(&self) -> usize {
        self.budget - self.evals_used
    }

    pub fn evals_used(&self) -> usize {
        self.evals_used
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn next_generation(&mut self) {
        self.generation += 1;
    }

    /// Reserve `n` evaluation slots from the budget.
    ///
    /// Callers must reserve before issuing evaluator calls; the controller
    /// never issues more calls than the configured budget.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.remaining(), "budget overdraw");
        self.evals_used += n.min(self.remaining());
    }

    /// Register a freshly mutated candidate.
    pub fn add_candidate(
        &mut self,
        text: String,
        parent: Uuid,
        feedback_digest: String,
    ) -> Uuid {
        let candidate = Candidate {
            id: Uuid::new_v4(),
            text,
            generation: self.generation + 1,
            parent: Some(parent),
            feedback_digest,
        };
        let id = candidate.id;
        self.records.push(CandidateRecord {
            candidate,
            results: Vec::new(),
        });
        id
    }

    /// Append an evaluation result to a candidate's ledger.
    pub fn record_result(&mut self, candidate_id: Uuid, result: EvalResult) {
        if let Some(record) = self
            .records
            .iter_mut()
            .find(|r| r.candidate.id == candidate_id)
        {
            record.results.push(result);
        }
    }

    pub fn get(&self, candidate_id: Uuid) -> Option<&CandidateRecord> {
        self.records.iter().find(|r| r.candidate.id == candidate_id)
    }

    /// The bounded frontier: best candidates by mean score, ties broken
    /// toward the earlier generation so convergence stays deterministic.
    pub fn frontier(&self) -> Vec<&CandidateRecord> {
        let mut ordered: Vec<&CandidateRecord> = self.records.iter().collect();
        ordered.sort_by(|a, b| {
            b.mean_score()
                .partial_cmp(&a.mean_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.candidate.generation.cmp(&b.candidate.generation))
        });
        ordered.truncate(self.frontier_size);
        ordered
    }

    /// Best candidate seen so far (ties prefer the earlier generation).
    pub fn best(&self) -> &CandidateRecord {
        self.frontier()
            .into_iter()
            .next()
            .expect("state always holds at least the seed candidate")
    }
}
