//! Trial records and outcomes

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::space::ParameterValue;

/// One intermediate quality report, keyed by the exploration step it was
/// measured at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntermediateReport {
    /// Exploration step count at report time
    pub step: u64,
    /// Reported quality value
    pub value: f64,
}

/// How a trial ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TrialState {
    /// Ran the full budget
    Complete {
        /// Final objective value
        value: f64,
    },
    /// Abandoned early by the pruner — an expected outcome, not a failure
    Pruned,
}

/// What a trial objective hands back to the study
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialOutcome {
    /// The trial ran to completion with this objective value
    Complete(f64),
    /// The trial was pruned
    Pruned,
}

/// A trial currently executing: sampled parameters plus the reports made so
/// far. Pruners see this view.
#[derive(Debug, Clone, Default)]
pub struct RunningTrial {
    /// Trial ID (position in the study)
    pub id: usize,
    /// Sampled parameters
    pub params: HashMap<String, ParameterValue>,
    /// Intermediate reports in reporting order
    pub reports: Vec<IntermediateReport>,
}

impl RunningTrial {
    /// Create an empty running trial
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// The latest report, if any
    pub fn last_report(&self) -> Option<IntermediateReport> {
        self.reports.last().copied()
    }
}

/// A finished trial as stored in the study
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial ID
    pub id: usize,
    /// Sampled parameters
    pub params: HashMap<String, ParameterValue>,
    /// Intermediate reports in reporting order
    pub reports: Vec<IntermediateReport>,
    /// Terminal state
    pub state: TrialState,
}

impl TrialRecord {
    /// Whether the trial completed its full budget
    pub fn is_complete(&self) -> bool {
        matches!(self.state, TrialState::Complete { .. })
    }

    /// The final objective value of a completed trial
    pub fn final_value(&self) -> Option<f64> {
        match self.state {
            TrialState::Complete { value } => Some(value),
            TrialState::Pruned => None,
        }
    }

    /// The intermediate value reported at exactly `step`, if any
    pub fn value_at_step(&self, step: u64) -> Option<f64> {
        self.reports
            .iter()
            .find(|r| r.step == step)
            .map(|r| r.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, reports: &[(u64, f64)], state: TrialState) -> TrialRecord {
        TrialRecord {
            id,
            params: HashMap::new(),
            reports: reports
                .iter()
                .map(|&(step, value)| IntermediateReport { step, value })
                .collect(),
            state,
        }
    }

    #[test]
    fn test_value_at_step_is_exact_match() {
        let trial = record(
            0,
            &[(100, 0.1), (200, 0.3)],
            TrialState::Complete { value: 0.3 },
        );
        assert_eq!(trial.value_at_step(100), Some(0.1));
        assert_eq!(trial.value_at_step(150), None);
        assert_eq!(trial.value_at_step(200), Some(0.3));
    }

    #[test]
    fn test_final_value_only_for_complete() {
        let done = record(0, &[(100, 0.4)], TrialState::Complete { value: 0.4 });
        let pruned = record(1, &[(100, 0.1)], TrialState::Pruned);
        assert_eq!(done.final_value(), Some(0.4));
        assert_eq!(pruned.final_value(), None);
    }
}
