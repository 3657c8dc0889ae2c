//! Evaluation: the fitness function for candidate skills.
//!
//! # Architecture
//!
//! ```text
//! Candidate + Task → Agent Backend → patch → Test Backend → EvalResult
//! ```
//!
//! The evaluator materializes the task's environment, runs the agent with
//! the candidate skill as guidance, extracts the resulting patch, verifies
//! it against the task's fail-to-pass tests, and folds every failure mode
//! into a scored result with diagnostics for the mutation step.

pub mod config;
pub mod evaluator;
pub mod result;
pub mod verifier;

pub use config::EvalConfig;
pub use evaluator::Evaluator;
pub use result::{EvalOutcome, EvalResult};
pub use verifier::{DockerVerifier, TestBackend, TestOutcome, VerifyCaps, VerifyReport};
