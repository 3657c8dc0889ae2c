//! The evolutionary search loop.
//!
//! SEEDED → OPTIMIZING → EXHAUSTED. Each generation samples a minibatch of
//! train tasks, scores the frontier against it (concurrently, bounded by
//! the configured limit), reflects the feedback into mutated candidates,
//! and keeps the best-scoring frontier. Every evaluator call consumes one
//! unit of the budget; the controller never issues more calls than the
//! budget allows.

use std::sync::Arc;

use futures::future::join_all;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::corpus::Task;
use crate::eval::{EvalResult, Evaluator};

use super::mutation::MutationBackend;
use super::state::SearchState;

/// Configuration for one optimization run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum evaluator calls for the whole run.
    pub budget: usize,
    /// Train tasks sampled per generation.
    pub batch_size: usize,
    /// Maximum candidates retained on the frontier.
    pub frontier_size: usize,
    /// RNG seed for task sampling, so a fixed seed gives a fixed schedule.
    pub seed: u64,
    /// Maximum validation tasks used for the final held-out check.
    pub val_sample: usize,
    /// Natural-language optimization objective handed to the mutator.
    pub objective: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: 150,
            batch_size: 3,
            frontier_size: 4,
            seed: 0,
            val_sample: 10,
            objective: "Maximize the resolve rate on software engineering tasks".to_string(),
        }
    }
}

/// Final result of one optimization run.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best candidate skill text found.
    pub best_skill: String,
    /// Generation the best candidate was created in.
    pub best_generation: u32,
    /// Mean train-split score of the best candidate.
    pub train_score: f64,
    /// Mean score of the best candidate on the held-out validation sample.
    pub val_score: Option<f64>,
    /// Evaluator calls actually issued (never exceeds the budget).
    pub evaluations_used: usize,
    /// Generations completed.
    pub generations: u32,
    /// True when the run never saw a nonzero score; the returned skill is
    /// then no better than the seed.
    pub low_confidence: bool,
}

/// Runs the evolutionary optimization loop over a fixed evaluation budget.
pub struct SearchController {
    evaluator: Arc<Evaluator>,
    mutator: Arc<dyn MutationBackend>,
    config: SearchConfig,
}

impl SearchController {
    pub fn new(
        evaluator: Arc<Evaluator>,
        mutator: Arc<dyn MutationBackend>,
        config: SearchConfig,
    ) -> Self {
        Self {
            evaluator,
            mutator,
            config,
        }
    }

    /// Run the full search: optimize on `train`, validate the winner on a
    /// sample of `val` (validation does not consume the budget).
    pub async fn run(&self, seed_skill: String, train: &[Task], val: &[Task]) -> SearchOutcome {
        let mut state = SearchState::new(
            self.config.budget,
            self.config.frontier_size,
            seed_skill,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let semaphore = Arc::new(Semaphore::new(self.evaluator.config().concurrency));

        if train.is_empty() {
            warn!("No train tasks available; returning seed candidate unevaluated");
            state.exhaust();
            let best = state.best();
            return SearchOutcome {
                best_skill: best.candidate.text.clone(),
                best_generation: 0,
                train_score: 0.0,
                val_score: None,
                evaluations_used: 0,
                generations: 0,
                low_confidence: true,
            };
        }

        info!(
            budget = self.config.budget,
            train_tasks = train.len(),
            "Starting optimization"
        );
        state.begin_optimizing();

        while state.remaining() > 0 {
            let batch: Vec<Task> = train
                .choose_multiple(&mut rng, self.config.batch_size.clamp(1, train.len()))
                .cloned()
                .collect();

            let results = self
                .evaluate_generation(&mut state, &batch, &semaphore)
                .await;
            if state.remaining() == 0 {
                break;
            }

            self.mutate_generation(&mut state, &results).await;
            state.next_generation();
        }
        state.exhaust();

        let (best_text, best_generation, train_score) = {
            let best = state.best();
            (
                best.candidate.text.clone(),
                best.candidate.generation,
                best.mean_score(),
            )
        };
        info!(
            evals = state.evals_used(),
            generations = state.generation(),
            train_score,
            "Budget exhausted"
        );

        let val_score = self
            .validate(&best_text, val, &mut rng, &semaphore)
            .await;

        SearchOutcome {
            best_skill: best_text,
            best_generation,
            train_score,
            val_score,
            evaluations_used: state.evals_used(),
            generations: state.generation(),
            low_confidence: train_score == 0.0,
        }
    }

    /// Score the current frontier on the batch, bounded by the remaining
    /// budget. Returns the (candidate, result) pairs of this generation.
    async fn evaluate_generation(
        &self,
        state: &mut SearchState,
        batch: &[Task],
        semaphore: &Arc<Semaphore>,
    ) -> Vec<(Uuid, EvalResult)> {
        let frontier: Vec<(Uuid, String)> = state
            .frontier()
            .into_iter()
            .map(|r| (r.candidate.id, r.candidate.text.clone()))
            .collect();

        let mut planned: Vec<(Uuid, String, Task)> = Vec::new();
        'plan: for (id, text) in &frontier {
            for task in batch {
                if planned.len() >= state.remaining() {
                    break 'plan;
                }
                planned.push((*id, text.clone(), task.clone()));
            }
        }
        state.consume(planned.len());

        let futures = planned.into_iter().map(|(id, text, task)| {
            let evaluator = Arc::clone(&self.evaluator);
            let sem = Arc::clone(semaphore);
            async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let result = evaluator.evaluate(&text, &task).await;
                (id, result)
            }
        });
        let results: Vec<(Uuid, EvalResult)> = join_all(futures).await;

        // Single-writer critical section: the ledger and budget are only
        // touched here, after all concurrent evaluations joined.
        for (id, result) in &results {
            state.record_result(*id, result.clone());
        }
        results
    }

    /// Reflect this generation's feedback into new candidates. Mutation
    /// failures are non-fatal; the budget already spent stays spent.
    async fn mutate_generation(
        &self,
        state: &mut SearchState,
        results: &[(Uuid, EvalResult)],
    ) {
        let (parent_id, parent_text) = {
            let best = state.best();
            (best.candidate.id, best.candidate.text.clone())
        };

        let mut feedback: Vec<EvalResult> = results
            .iter()
            .filter(|(id, _)| *id == parent_id)
            .map(|(_, r)| r.clone())
            .collect();
        if feedback.is_empty() {
            feedback = results.iter().map(|(_, r)| r.clone()).collect();
        }

        match self
            .mutator
            .mutate(&parent_text, &self.config.objective, &feedback)
            .await
        {
            Ok(children) => {
                let digest = format!(
                    "gen {}: {} evals, mean {:.2}",
                    state.generation(),
                    feedback.len(),
                    feedback.iter().map(|r| r.score).sum::<f64>()
                        / feedback.len().max(1) as f64
                );
                for child in children {
                    state.add_candidate(child, parent_id, digest.clone());
                }
            }
            Err(e) => {
                warn!(error = %e, "Mutation failed for this generation (continuing)");
            }
        }
    }

    /// Score the winning candidate on a held-out validation sample.
    async fn validate(
        &self,
        best_text: &str,
        val: &[Task],
        rng: &mut ChaCha8Rng,
        semaphore: &Arc<Semaphore>,
    ) -> Option<f64> {
        if val.is_empty() {
            return None;
        }
        let sample: Vec<Task> = val
            .choose_multiple(rng, self.config.val_sample.min(val.len()))
            .cloned()
            .collect();

        let futures = sample.into_iter().map(|task| {
            let evaluator = Arc::clone(&self.evaluator);
            let sem = Arc::clone(semaphore);
            let text = best_text.to_string();
            async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                evaluator.evaluate(&text, &task).await
            }
        });
        let results = join_all(futures).await;
        let mean = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
        info!(val_tasks = results.len(), val_score = mean, "Held-out validation finished");
        Some(mean)
    }
}
