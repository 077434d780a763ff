//! Early-termination strategies for search trials
//!
//! All pruners assume a maximized objective and are consulted once per
//! evaluation cycle, after the trial reported its latest quality value.

use super::trial::{RunningTrial, TrialRecord};

/// Votes on abandoning a running trial given the study history
pub trait Pruner: Send + Sync {
    /// Whether the trial should be abandoned now
    fn should_prune(&self, trial: &RunningTrial, history: &[TrialRecord]) -> bool;
}

/// Prunes trials whose latest report falls below the median of earlier
/// trials' reports at the same step.
///
/// Stays silent until `n_startup_trials` trials completed and until the
/// trial has passed `n_warmup_steps` exploration steps.
#[derive(Debug, Clone)]
pub struct MedianPruner {
    /// Completed trials required before any pruning
    pub n_startup_trials: usize,
    /// Exploration steps a trial is immune for
    pub n_warmup_steps: u64,
}

impl MedianPruner {
    /// Create a median pruner
    pub fn new(n_startup_trials: usize, n_warmup_steps: u64) -> Self {
        Self {
            n_startup_trials,
            n_warmup_steps,
        }
    }
}

impl Pruner for MedianPruner {
    fn should_prune(&self, trial: &RunningTrial, history: &[TrialRecord]) -> bool {
        let Some(last) = trial.last_report() else {
            return false;
        };
        if last.step < self.n_warmup_steps {
            return false;
        }
        let completed = history.iter().filter(|t| t.is_complete()).count();
        if completed < self.n_startup_trials {
            return false;
        }

        let mut values: Vec<f64> = history
            .iter()
            .filter_map(|t| t.value_at_step(last.step))
            .collect();
        if values.is_empty() {
            return false;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let median = if values.len() % 2 == 1 {
            values[values.len() / 2]
        } else {
            let mid = values.len() / 2;
            (values[mid - 1] + values[mid]) / 2.0
        };
        last.value < median
    }
}

/// Prunes trials whose latest report falls below a fixed lower bound after
/// the warmup period
#[derive(Debug, Clone)]
pub struct ThresholdPruner {
    /// Minimum acceptable quality
    pub lower: f64,
    /// Exploration steps a trial is immune for
    pub n_warmup_steps: u64,
}

impl ThresholdPruner {
    /// Create a threshold pruner
    pub fn new(lower: f64, n_warmup_steps: u64) -> Self {
        Self {
            lower,
            n_warmup_steps,
        }
    }
}

impl Pruner for ThresholdPruner {
    fn should_prune(&self, trial: &RunningTrial, _history: &[TrialRecord]) -> bool {
        let Some(last) = trial.last_report() else {
            return false;
        };
        last.step >= self.n_warmup_steps && last.value < self.lower
    }
}

/// Prunes trials whose quality has stopped moving.
///
/// Tracks the moving average over the last `n_averaged_values` reports; a
/// report scores a strike when that average moved less than
/// `fluctuation_boundary` since the previous report. `n_strikes` consecutive
/// strikes after the warmup period prune the trial.
#[derive(Debug, Clone)]
pub struct StagnatingPruner {
    /// Minimum moving-average movement that counts as progress
    pub fluctuation_boundary: f64,
    /// Exploration steps a trial is immune for
    pub n_warmup_steps: u64,
    /// Window width of the moving average
    pub n_averaged_values: usize,
    /// Consecutive strikes required to prune
    pub n_strikes: usize,
}

impl StagnatingPruner {
    /// Create a stagnation pruner
    pub fn new(
        fluctuation_boundary: f64,
        n_warmup_steps: u64,
        n_averaged_values: usize,
        n_strikes: usize,
    ) -> Self {
        Self {
            fluctuation_boundary,
            n_warmup_steps,
            n_averaged_values,
            n_strikes,
        }
    }

    fn moving_average(&self, trial: &RunningTrial, end: usize) -> Option<f64> {
        if end + 1 < self.n_averaged_values {
            return None;
        }
        let window = &trial.reports[end + 1 - self.n_averaged_values..=end];
        Some(window.iter().map(|r| r.value).sum::<f64>() / window.len() as f64)
    }
}

impl Pruner for StagnatingPruner {
    fn should_prune(&self, trial: &RunningTrial, _history: &[TrialRecord]) -> bool {
        let Some(last) = trial.last_report() else {
            return false;
        };
        if last.step < self.n_warmup_steps {
            return false;
        }
        if self.n_strikes == 0 || self.n_averaged_values == 0 {
            return false;
        }
        if trial.reports.len() < self.n_averaged_values + self.n_strikes {
            return false;
        }

        let end = trial.reports.len() - 1;
        for i in end + 1 - self.n_strikes..=end {
            let current = match self.moving_average(trial, i) {
                Some(v) => v,
                None => return false,
            };
            let previous = match self.moving_average(trial, i - 1) {
                Some(v) => v,
                None => return false,
            };
            if (current - previous).abs() >= self.fluctuation_boundary {
                return false;
            }
        }
        true
    }
}

/// OR-composition of pruners: a trial is pruned as soon as ANY constituent
/// votes to prune; it survives only when all constituents vote to keep it.
pub struct CombinationPruner {
    pruners: Vec<Box<dyn Pruner>>,
}

impl CombinationPruner {
    /// Compose the given pruners
    pub fn new(pruners: Vec<Box<dyn Pruner>>) -> Self {
        Self { pruners }
    }
}

impl Pruner for CombinationPruner {
    fn should_prune(&self, trial: &RunningTrial, history: &[TrialRecord]) -> bool {
        self.pruners
            .iter()
            .any(|p| p.should_prune(trial, history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::trial::{IntermediateReport, TrialState};
    use std::collections::HashMap;

    fn running(reports: &[(u64, f64)]) -> RunningTrial {
        RunningTrial {
            id: 9,
            params: HashMap::new(),
            reports: reports
                .iter()
                .map(|&(step, value)| IntermediateReport { step, value })
                .collect(),
        }
    }

    fn finished(id: usize, reports: &[(u64, f64)]) -> TrialRecord {
        let value = reports.last().map(|&(_, v)| v).unwrap_or(0.0);
        TrialRecord {
            id,
            params: HashMap::new(),
            reports: reports
                .iter()
                .map(|&(step, value)| IntermediateReport { step, value })
                .collect(),
            state: TrialState::Complete { value },
        }
    }

    #[test]
    fn test_threshold_waits_for_warmup() {
        let pruner = ThresholdPruner::new(0.2, 1_000);
        assert!(!pruner.should_prune(&running(&[(500, 0.05)]), &[]));
        assert!(pruner.should_prune(&running(&[(1_000, 0.05)]), &[]));
        assert!(!pruner.should_prune(&running(&[(1_000, 0.35)]), &[]));
    }

    #[test]
    fn test_median_compares_same_step() {
        let history = vec![
            finished(0, &[(100, 0.2), (200, 0.5)]),
            finished(1, &[(100, 0.4), (200, 0.7)]),
            finished(2, &[(100, 0.6), (200, 0.9)]),
        ];
        let pruner = MedianPruner::new(3, 0);

        // below the median 0.7 at step 200
        assert!(pruner.should_prune(&running(&[(200, 0.6)]), &history));
        // at or above it survives
        assert!(!pruner.should_prune(&running(&[(200, 0.7)]), &history));
    }

    #[test]
    fn test_median_needs_startup_trials() {
        let history = vec![finished(0, &[(200, 0.9)])];
        let pruner = MedianPruner::new(5, 0);
        assert!(!pruner.should_prune(&running(&[(200, 0.0)]), &history));
    }

    #[test]
    fn test_stagnation_strikes() {
        let pruner = StagnatingPruner::new(0.01, 0, 2, 2);

        // flat quality: moving averages stop moving
        let flat = running(&[(1, 0.30), (2, 0.30), (3, 0.30), (4, 0.30), (5, 0.30)]);
        assert!(pruner.should_prune(&flat, &[]));

        // still climbing: no strike
        let climbing = running(&[(1, 0.10), (2, 0.20), (3, 0.30), (4, 0.40), (5, 0.50)]);
        assert!(!pruner.should_prune(&climbing, &[]));
    }

    #[test]
    fn test_stagnation_needs_enough_reports() {
        let pruner = StagnatingPruner::new(0.01, 0, 10, 5);
        let short = running(&[(1, 0.3), (2, 0.3), (3, 0.3)]);
        assert!(!pruner.should_prune(&short, &[]));
    }

    struct Fixed(bool);
    impl Pruner for Fixed {
        fn should_prune(&self, _: &RunningTrial, _: &[TrialRecord]) -> bool {
            self.0
        }
    }

    #[test]
    fn test_combination_is_logical_or() {
        let trial = running(&[(100, 0.5)]);
        let cases = [
            (vec![false, false, false], false),
            (vec![true, false, false], true),
            (vec![false, true, false], true),
            (vec![false, false, true], true),
            (vec![true, true, true], true),
        ];
        for (votes, expected) in cases {
            let pruners: Vec<Box<dyn Pruner>> = votes
                .iter()
                .map(|&v| Box::new(Fixed(v)) as Box<dyn Pruner>)
                .collect();
            let combined = CombinationPruner::new(pruners);
            assert_eq!(combined.should_prune(&trial, &[]), expected);
        }
    }

    #[test]
    fn test_empty_combination_never_prunes() {
        let combined = CombinationPruner::new(Vec::new());
        assert!(!combined.should_prune(&running(&[(100, 0.0)]), &[]));
    }
}
