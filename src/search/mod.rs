//! Hyperparameter search
//!
//! A sequential study samples hyperparameter sets at random, runs one trial
//! per set, and prunes underperforming trials early based on the quality
//! values reported after each evaluation cycle. Pruning strategies compose
//! by logical OR: one vote to prune is enough.

pub mod pruner;
pub mod space;
pub mod study;
pub mod trial;

pub use pruner::{CombinationPruner, MedianPruner, Pruner, StagnatingPruner, ThresholdPruner};
pub use space::{Parameter, ParameterValue};
pub use study::{Study, TrialContext};
pub use trial::{IntermediateReport, RunningTrial, TrialOutcome, TrialRecord, TrialState};
