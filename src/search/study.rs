//! Sequential study execution
//!
//! A study runs trials one after another; there is no trial-level
//! parallelism. Each trial sees the history of all earlier trials through
//! its pruner. The study state is rewritten to disk after every trial so a
//! crashed search leaves the finished trials behind.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use super::pruner::Pruner;
use super::space::{Parameter, ParameterValue};
use super::trial::{IntermediateReport, RunningTrial, TrialOutcome, TrialRecord, TrialState};

/// Handle a trial objective uses to sample parameters, report intermediate
/// quality, and ask the pruner for a verdict
pub struct TrialContext<'s> {
    trial: RunningTrial,
    history: &'s [TrialRecord],
    pruner: &'s dyn Pruner,
    rng: &'s mut StdRng,
}

impl TrialContext<'_> {
    /// Trial ID within the study
    pub fn id(&self) -> usize {
        self.trial.id
    }

    /// Parameters sampled so far
    pub fn params(&self) -> &HashMap<String, ParameterValue> {
        &self.trial.params
    }

    /// Sample a float parameter, log-uniformly if `log_scale` is set
    pub fn suggest_float(&mut self, name: &str, min: f64, max: f64, log_scale: bool) -> f64 {
        let param = Parameter::Float {
            name: name.to_string(),
            min,
            max,
            log_scale,
        };
        let value = param.sample(self.rng);
        self.trial.params.insert(name.to_string(), value);
        value.as_f64()
    }

    /// Sample a stepped integer parameter from `min..=max`
    pub fn suggest_int(&mut self, name: &str, min: i64, max: i64, step: i64) -> i64 {
        let param = Parameter::Int {
            name: name.to_string(),
            min,
            max,
            step,
        };
        let value = param.sample(self.rng);
        self.trial.params.insert(name.to_string(), value);
        match value {
            ParameterValue::Int(v) => v,
            ParameterValue::Float(v) => v as i64,
        }
    }

    /// Record an intermediate quality value at an exploration step
    pub fn report(&mut self, value: f64, step: u64) {
        self.trial.reports.push(IntermediateReport { step, value });
    }

    /// Ask the composed pruner whether this trial should be abandoned
    pub fn should_prune(&self) -> bool {
        self.pruner.should_prune(&self.trial, self.history)
    }
}

#[derive(Debug, Serialize)]
struct StudyState<'a> {
    created_at: DateTime<Utc>,
    trials: &'a [TrialRecord],
}

/// A maximize-direction study with a random sampler and a composed pruner
pub struct Study {
    pruner: Box<dyn Pruner>,
    trials: Vec<TrialRecord>,
    rng: StdRng,
    state_file: Option<PathBuf>,
    created_at: DateTime<Utc>,
}

impl Study {
    /// Create a study with an entropy-seeded sampler
    pub fn new(pruner: Box<dyn Pruner>) -> Self {
        Self::with_seed(pruner, rand::random())
    }

    /// Create a study with a fixed sampler seed
    pub fn with_seed(pruner: Box<dyn Pruner>, seed: u64) -> Self {
        Self {
            pruner,
            trials: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            state_file: None,
            created_at: Utc::now(),
        }
    }

    /// Persist the study state to `path` after every trial
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Run `n_trials` trials sequentially.
    ///
    /// The objective returns a [`TrialOutcome`] — pruning is a value, not an
    /// error. An `Err` from the objective is fatal and aborts the study.
    pub fn optimize<F>(&mut self, n_trials: usize, mut objective: F) -> Result<()>
    where
        F: FnMut(&mut TrialContext) -> Result<TrialOutcome>,
    {
        for _ in 0..n_trials {
            let id = self.trials.len();
            let outcome;
            let finished;
            {
                let mut context = TrialContext {
                    trial: RunningTrial::new(id),
                    history: &self.trials,
                    pruner: self.pruner.as_ref(),
                    rng: &mut self.rng,
                };
                outcome = objective(&mut context)?;
                finished = context.trial;
            }

            let state = match outcome {
                TrialOutcome::Complete(value) => TrialState::Complete { value },
                TrialOutcome::Pruned => TrialState::Pruned,
            };
            tracing::info!(trial = id, ?state, "trial finished");
            self.trials.push(TrialRecord {
                id,
                params: finished.params,
                reports: finished.reports,
                state,
            });
            self.persist()?;
        }
        Ok(())
    }

    /// All finished trials in execution order
    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    /// The completed trial with the highest objective value
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        self.trials
            .iter()
            .filter(|t| t.is_complete())
            .max_by(|a, b| {
                a.final_value()
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&b.final_value().unwrap_or(f64::NEG_INFINITY))
            })
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        let state = StudyState {
            created_at: self.created_at,
            trials: &self.trials,
        };
        let json = serde_json::to_string_pretty(&state)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
