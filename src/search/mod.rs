//! Evolutionary search over candidate skills.
//!
//! The controller owns the only mutable state of a run (budget counter,
//! candidate ledger, frontier) and serializes updates to it; evaluations
//! themselves run concurrently up to the configured limit.

pub mod controller;
pub mod mutation;
pub mod state;

pub use controller::{SearchConfig, SearchController, SearchOutcome};
pub use mutation::{MutationBackend, ReflectiveMutator};
pub use state::{Candidate, CandidateRecord, SearchPhase, SearchState};
