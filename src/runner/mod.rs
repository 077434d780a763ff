//! Training run orchestration
//!
//! The runner owns the agent for the lifetime of one run and sequences the
//! phases strictly: heatup completes before any cycle begins, and each
//! explore/update/eval cycle completes before the next starts. Cancellation
//! is cooperative — after every evaluation a [`CycleHook`] may vote to prune,
//! and an agent update error ends the loop softly with the last measured
//! quality.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentGuard};
use crate::config::TrainingSchedule;

/// Monotonically non-decreasing phase counters of one run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StepCounter {
    /// Heatup environment steps
    pub heatup: u64,
    /// Exploration environment steps
    pub exploration: u64,
    /// Learning-update steps
    pub update: u64,
    /// Evaluation episodes played
    pub eval_episodes: u64,
}

/// Construction parameters for a [`Runner`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Lower bounds of random heatup actions
    pub heatup_action_low: Vec<f64>,
    /// Upper bounds of random heatup actions
    pub heatup_action_high: Vec<f64>,
    /// Hyperparameters recorded verbatim into the results file
    pub agent_parameters: serde_json::Value,
    /// Folder receiving periodic checkpoints
    pub checkpoint_folder: PathBuf,
    /// Results file, rewritten after every evaluation
    pub results_file: PathBuf,
    /// Info metrics carried into each results row
    pub info_results: Vec<String>,
    /// Name of the eval metric used as the run's quality signal
    pub quality_info: String,
}

/// Vote of a [`CycleHook`] after an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDecision {
    /// Keep cycling
    Continue,
    /// Abandon the run; the runner releases the agent before returning
    Prune,
}

/// Per-cycle observer, consulted once after every evaluation pass
pub trait CycleHook {
    /// Inspect the cycle's quality and vote on continuing
    fn after_eval(&mut self, quality: f64, exploration_steps: u64) -> CycleDecision;
}

/// Hook that never prunes, used by fixed training runs
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueAlways;

impl CycleHook for ContinueAlways {
    fn after_eval(&mut self, _quality: f64, _exploration_steps: u64) -> CycleDecision {
        CycleDecision::Continue
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// The exploration budget was spent
    Completed {
        /// Quality of the final evaluation
        quality: f64,
        /// Mean reward of the final evaluation
        reward: f64,
    },
    /// A hook voted to prune; the agent was released before returning
    Pruned {
        /// Quality measured by the last evaluation before pruning
        last_quality: f64,
    },
    /// The agent flagged an update error; the loop exited early
    Degraded {
        /// Last measured quality
        quality: f64,
        /// Last measured mean reward
        reward: f64,
    },
}

impl RunOutcome {
    /// The quality value this outcome carries
    pub fn quality(&self) -> f64 {
        match *self {
            RunOutcome::Completed { quality, .. } => quality,
            RunOutcome::Pruned { last_quality } => last_quality,
            RunOutcome::Degraded { quality, .. } => quality,
        }
    }

    /// Whether the run was pruned
    pub fn is_pruned(&self) -> bool {
        matches!(self, RunOutcome::Pruned { .. })
    }
}

/// Final numbers of a fixed training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Mean reward of the final evaluation
    pub reward: f64,
    /// Success rate of the final evaluation
    pub success: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EvalRow {
    exploration_steps: u64,
    update_steps: u64,
    quality: f64,
    mean_reward: f64,
    metrics: HashMap<String, f64>,
    recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResultsLog {
    created_at: DateTime<Utc>,
    agent_parameters: serde_json::Value,
    info_results: Vec<String>,
    quality_info: String,
    rows: Vec<EvalRow>,
}

/// Orchestrates heatup, explore/update/eval cycles, and result persistence
/// around one agent
#[derive(Debug)]
pub struct Runner<A: Agent> {
    agent: AgentGuard<A>,
    settings: RunnerSettings,
    counter: StepCounter,
    results: ResultsLog,
}

impl<A: Agent> Runner<A> {
    /// Create a runner owning `agent`
    pub fn new(agent: A, settings: RunnerSettings) -> Result<Self> {
        if settings.heatup_action_low.len() != settings.heatup_action_high.len() {
            return Err(anyhow!("heatup action bounds must have equal length"));
        }
        if settings.quality_info.is_empty() {
            return Err(anyhow!("quality_info must name an eval metric"));
        }
        let results = ResultsLog {
            created_at: Utc::now(),
            agent_parameters: settings.agent_parameters.clone(),
            info_results: settings.info_results.clone(),
            quality_info: settings.quality_info.clone(),
            rows: Vec::new(),
        };
        Ok(Self {
            agent: AgentGuard::new(agent),
            settings,
            counter: StepCounter::default(),
            results,
        })
    }

    /// The run's phase counters
    pub fn step_counter(&self) -> StepCounter {
        self.counter
    }

    /// Serialize the runner configuration to a JSON file
    pub fn save_config(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Run the heatup phase: random-action data collection before updates
    pub fn heatup(&mut self, steps: u64) -> Result<()> {
        tracing::info!(steps, "starting heatup");
        let report = self.agent.agent_mut().heatup(
            steps,
            &self.settings.heatup_action_low,
            &self.settings.heatup_action_high,
        )?;
        self.counter.heatup += report.steps;
        Ok(())
    }

    /// One cycle of bounded explore bursts, each followed by a proportional
    /// number of update steps. Returns the exploration steps collected.
    pub fn explore_and_update(
        &mut self,
        consecutive_episodes: u64,
        update_per_explore_step: f64,
        explore_step_limit: u64,
    ) -> Result<u64> {
        let mut cycle_steps = 0u64;
        while cycle_steps < explore_step_limit {
            let remaining = explore_step_limit - cycle_steps;
            let explored = self
                .agent
                .agent_mut()
                .explore(consecutive_episodes, remaining)?;
            if explored.steps == 0 {
                return Err(anyhow!("exploration made no progress"));
            }
            cycle_steps += explored.steps;
            self.counter.exploration += explored.steps;

            let update_steps = (explored.steps as f64 * update_per_explore_step).round() as u64;
            let updated = self.agent.agent_mut().update(update_steps)?;
            self.counter.update += updated.steps;
        }
        Ok(cycle_steps)
    }

    /// Evaluate on the fixed seed list; returns `(mean_reward, quality)`.
    ///
    /// Appends a results row and writes a checkpoint as side effects.
    pub fn eval(&mut self, seeds: &[u64]) -> Result<(f64, f64)> {
        let report = self.agent.agent_mut().eval(seeds)?;
        let quality = report.metric(&self.settings.quality_info).ok_or_else(|| {
            anyhow!(
                "eval report missing quality metric '{}'",
                self.settings.quality_info
            )
        })?;
        self.counter.eval_episodes += seeds.len() as u64;

        let mut metrics = HashMap::new();
        for key in &self.settings.info_results {
            if let Some(value) = report.metric(key) {
                metrics.insert(key.clone(), value);
            }
        }
        self.results.rows.push(EvalRow {
            exploration_steps: self.counter.exploration,
            update_steps: self.counter.update,
            quality,
            mean_reward: report.mean_reward,
            metrics,
            recorded_at: Utc::now(),
        });
        self.persist_results()?;
        self.write_checkpoint()?;

        tracing::info!(
            exploration = self.counter.exploration,
            quality,
            mean_reward = report.mean_reward,
            "evaluation finished"
        );
        Ok((report.mean_reward, quality))
    }

    fn persist_results(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.results)?;
        fs::write(&self.settings.results_file, json)
            .with_context(|| format!("writing {}", self.settings.results_file.display()))?;
        Ok(())
    }

    fn write_checkpoint(&self) -> Result<()> {
        let path = self
            .settings
            .checkpoint_folder
            .join(format!("checkpoint_{:010}.json", self.counter.exploration));
        self.agent.agent().save_checkpoint(&path)
    }

    /// Run heatup and then explore/update/eval cycles until the exploration
    /// budget is spent, consulting `hook` after each evaluation.
    ///
    /// The same `eval_seeds` slice is passed to every evaluation, preserving
    /// list identity and order across cycles. If the budget allows no cycle
    /// at all, the returned quality is 0.
    pub fn run(
        &mut self,
        schedule: &TrainingSchedule,
        eval_seeds: &[u64],
        hook: &mut dyn CycleHook,
    ) -> Result<RunOutcome> {
        schedule.validate()?;
        self.heatup(schedule.heatup_steps)?;

        let mut last_quality = 0.0;
        let mut last_reward = 0.0;
        while self.counter.exploration < schedule.training_steps {
            self.explore_and_update(
                schedule.consecutive_explore_episodes,
                schedule.update_per_explore_step,
                schedule.explore_steps_between_eval,
            )?;
            let (reward, quality) = self.eval(eval_seeds)?;
            last_quality = quality;
            last_reward = reward;

            if hook.after_eval(quality, self.counter.exploration) == CycleDecision::Prune {
                self.close()?;
                return Ok(RunOutcome::Pruned {
                    last_quality: quality,
                });
            }
            if self.agent.agent().update_error() {
                tracing::warn!("agent reported update error, stopping run early");
                return Ok(RunOutcome::Degraded { quality, reward });
            }
        }
        Ok(RunOutcome::Completed {
            quality: last_quality,
            reward: last_reward,
        })
    }

    /// Fixed training run over the full schedule, never pruned
    pub fn training_run(
        &mut self,
        schedule: &TrainingSchedule,
        eval_seeds: &[u64],
    ) -> Result<TrainingSummary> {
        let outcome = self.run(schedule, eval_seeds, &mut ContinueAlways)?;
        let (reward, success) = match outcome {
            RunOutcome::Completed { quality, reward } => (reward, quality),
            RunOutcome::Degraded { quality, reward } => (reward, quality),
            RunOutcome::Pruned { .. } => unreachable!("ContinueAlways never prunes"),
        };
        Ok(TrainingSummary { reward, success })
    }

    /// Release the agent; later calls and the drop handler are no-ops
    pub fn close(&mut self) -> Result<()> {
        self.agent.close()
    }

    /// Whether the agent was already released
    pub fn is_closed(&self) -> bool {
        self.agent.is_closed()
    }
}
