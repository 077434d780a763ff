//! Simulated synchronous agent
//!
//! Stands in for the real SAC stack: exploration fans episodes out over a
//! pool of worker threads, evaluation replays the fixed seed list on the
//! eval environment, and policy quality is a closed-form skill curve driven
//! by the accumulated update steps and the learning-rate schedule. Faithful
//! enough to exercise every control-flow path of the runner, including the
//! update-error soft failure.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{anyhow, Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::{Agent, EvalReport, ExploreReport, HeatupReport, UpdateReport};
use crate::config::AgentHyperparams;
use crate::device::Device;
use crate::env::vessel::{ACTION_HIGH, ACTION_LOW};
use crate::env::{EnvMode, Environment, Intervention, VesselEnv};

/// Learning rate at which the skill curve is calibrated
const REFERENCE_LR: f64 = 3.2e-4;

/// Learning rates above this destabilize updates and trip `update_error`
const LR_STABILITY_BOUND: f64 = 2.5e-3;

/// Construction parameters for [`SynchronAgent`]
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Device hosting network updates
    pub trainer_device: Device,
    /// Device hosting worker inference
    pub worker_device: Device,
    /// Number of exploration workers
    pub n_worker: usize,
    /// Sample eval actions stochastically instead of taking the mean
    pub stochastic_eval: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            trainer_device: Device::Cpu,
            worker_device: Device::Cpu,
            n_worker: 2,
            stochastic_eval: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct EpisodeOutcome {
    steps: u64,
    reward: f64,
    success: f64,
    path_ratio: f64,
}

/// Simulated synchronous SAC-style agent over two [`VesselEnv`]s
#[derive(Debug)]
pub struct SynchronAgent<I: Intervention + Clone> {
    settings: AgentSettings,
    hyper: AgentHyperparams,
    env_train: VesselEnv<I>,
    env_eval: VesselEnv<I>,
    replay_len: u64,
    explore_steps: u64,
    update_steps: u64,
    learning_progress: f64,
    explore_nonce: u64,
    eval_nonce: u64,
    update_error: bool,
    closed: bool,
}

impl<I: Intervention + Clone + 'static> SynchronAgent<I> {
    /// Create an agent around a train and an eval environment
    pub fn new(
        settings: AgentSettings,
        hyper: AgentHyperparams,
        env_train: VesselEnv<I>,
        env_eval: VesselEnv<I>,
    ) -> Result<Self> {
        hyper.validate()?;
        if settings.n_worker == 0 {
            return Err(anyhow!("n_worker must be positive"));
        }
        if env_train.mode() != EnvMode::Train || env_eval.mode() != EnvMode::Eval {
            return Err(anyhow!("agent needs one train and one eval environment"));
        }
        tracing::info!(
            trainer_device = %settings.trainer_device,
            worker_device = %settings.worker_device,
            n_worker = settings.n_worker,
            "agent created"
        );
        Ok(Self {
            settings,
            hyper,
            env_train,
            env_eval,
            replay_len: 0,
            explore_steps: 0,
            update_steps: 0,
            learning_progress: 0.0,
            explore_nonce: 0,
            eval_nonce: 0,
            update_error: false,
            closed: false,
        })
    }

    /// Linearly decayed learning rate at the current exploration step
    pub fn current_lr(&self) -> f64 {
        let t = (self.explore_steps as f64 / self.hyper.lr_linear_end_steps as f64).min(1.0);
        self.hyper.learning_rate * (1.0 - t * (1.0 - self.hyper.lr_end_factor))
    }

    /// Policy quality in [0, 1), grown by learning updates.
    ///
    /// The asymptote depends on how well the hyperparameters fit: learning
    /// rates far from the calibration point and undersized networks cap the
    /// reachable skill.
    pub fn skill(&self) -> f64 {
        let lr_fit = (-(self.hyper.learning_rate / REFERENCE_LR).ln().powi(2) / 8.0).exp();
        let width = self.hyper.hidden_layers.iter().map(|&n| n as f64).sum::<f64>()
            / self.hyper.hidden_layers.len() as f64;
        let capacity = (width / 400.0).clamp(0.5, 1.5).powf(0.1)
            * (self.hyper.embedder_nodes as f64 / 700.0)
                .clamp(0.3, 1.4)
                .powf(0.05);
        let asymptote = (0.95 * lr_fit * capacity).clamp(0.05, 0.99);
        asymptote * (1.0 - (-self.learning_progress * 6e-6).exp())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(anyhow!("agent is closed"));
        }
        Ok(())
    }

    fn run_episode(
        env: &mut VesselEnv<I>,
        seed: Option<u64>,
        rng: &mut SmallRng,
        skill: f64,
    ) -> Result<EpisodeOutcome> {
        let mut obs = env.reset(seed)?;
        let mut outcome = EpisodeOutcome::default();
        loop {
            // Blend the target-seeking action with exploration noise; the
            // blend weight is the current policy skill.
            let ideal = [
                (obs[2] * 400.0).clamp(ACTION_LOW[0], ACTION_HIGH[0]),
                (obs[3] * 5.0).clamp(ACTION_LOW[1], ACTION_HIGH[1]),
            ];
            let noise = [
                rng.gen_range(ACTION_LOW[0]..ACTION_HIGH[0]),
                rng.gen_range(ACTION_LOW[1]..ACTION_HIGH[1]),
            ];
            let action = [
                skill * ideal[0] + (1.0 - skill) * noise[0],
                skill * ideal[1] + (1.0 - skill) * noise[1],
            ];

            let result = env.step(&action)?;
            obs = result.observation;
            outcome.steps += 1;
            outcome.reward += result.reward;
            if result.terminated || result.truncated {
                outcome.success = result.info.get("success").copied().unwrap_or(0.0);
                outcome.path_ratio = result.info.get("path_ratio").copied().unwrap_or(0.0);
                break;
            }
        }
        Ok(outcome)
    }
}

impl<I: Intervention + Clone + 'static> Agent for SynchronAgent<I> {
    fn heatup(
        &mut self,
        steps: u64,
        action_low: &[f64],
        action_high: &[f64],
    ) -> Result<HeatupReport> {
        self.ensure_open()?;
        let mut env = self.env_train.clone();
        let mut rng = SmallRng::seed_from_u64(0x4EA7);
        let mut report = HeatupReport::default();
        while report.steps < steps {
            env.reset(None)?;
            report.episodes += 1;
            loop {
                let action = [
                    rng.gen_range(action_low[0]..action_high[0]),
                    rng.gen_range(action_low[1]..action_high[1]),
                ];
                let result = env.step(&action)?;
                report.steps += 1;
                if result.terminated || result.truncated || report.steps >= steps {
                    break;
                }
            }
        }
        self.replay_len = (self.replay_len + report.steps).min(self.hyper.replay_buffer_size);
        tracing::info!(steps = report.steps, episodes = report.episodes, "heatup finished");
        Ok(report)
    }

    fn explore(&mut self, consecutive_episodes: u64, step_limit: u64) -> Result<ExploreReport> {
        self.ensure_open()?;
        let skill = self.skill();
        self.explore_nonce += 1;
        let nonce = self.explore_nonce;
        let n_worker = self.settings.n_worker as u64;

        let stop = AtomicBool::new(false);
        let (tx, rx) = crossbeam_channel::unbounded::<EpisodeOutcome>();

        let mut report = ExploreReport::default();
        let mut reward_sum = 0.0;

        thread::scope(|scope| -> Result<()> {
            for worker in 0..n_worker {
                let mut env = self.env_train.clone();
                let tx = tx.clone();
                let stop = &stop;
                // episodes are split round-robin across workers
                let quota = consecutive_episodes / n_worker
                    + u64::from(worker < consecutive_episodes % n_worker);
                scope.spawn(move || {
                    let mut rng =
                        SmallRng::seed_from_u64(nonce.wrapping_mul(0x9E37_79B9).wrapping_add(worker));
                    for _ in 0..quota {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        match Self::run_episode(&mut env, None, &mut rng, skill) {
                            Ok(outcome) => {
                                if tx.send(outcome).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("explore episode failed: {e:#}");
                                break;
                            }
                        }
                    }
                });
            }
            drop(tx);

            for outcome in rx.iter() {
                report.steps += outcome.steps;
                report.episodes += 1;
                reward_sum += outcome.reward;
                if report.steps >= step_limit {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            Ok(())
        })?;

        if report.episodes > 0 {
            report.mean_reward = reward_sum / report.episodes as f64;
        }
        self.explore_steps += report.steps;
        self.replay_len = (self.replay_len + report.steps).min(self.hyper.replay_buffer_size);
        Ok(report)
    }

    fn update(&mut self, steps: u64) -> Result<UpdateReport> {
        self.ensure_open()?;
        // no minibatches before the buffer holds one
        if self.replay_len < self.hyper.batch_size as u64 {
            return Ok(UpdateReport { steps: 0 });
        }
        if self.hyper.learning_rate > LR_STABILITY_BOUND {
            self.update_error = true;
            tracing::warn!(
                lr = self.hyper.learning_rate,
                "update diverged, flagging update error"
            );
            return Ok(UpdateReport { steps: 0 });
        }
        self.update_steps += steps;
        self.learning_progress += steps as f64 * (self.current_lr() / REFERENCE_LR);
        Ok(UpdateReport { steps })
    }

    fn eval(&mut self, seeds: &[u64]) -> Result<EvalReport> {
        self.ensure_open()?;
        let skill = self.skill();
        if self.settings.stochastic_eval {
            self.eval_nonce += 1;
        }

        let mut report = EvalReport::default();
        let mut success_sum = 0.0;
        let mut steps_sum = 0.0;
        let mut path_sum = 0.0;
        for &seed in seeds {
            let mut rng = SmallRng::seed_from_u64(seed ^ self.eval_nonce.wrapping_mul(0xA5A5));
            let outcome = Self::run_episode(&mut self.env_eval, Some(seed), &mut rng, skill)?;
            report.mean_reward += outcome.reward;
            success_sum += outcome.success;
            steps_sum += outcome.steps as f64;
            path_sum += outcome.path_ratio;
        }
        let n = seeds.len().max(1) as f64;
        report.mean_reward /= n;
        report.metrics.insert("success".to_string(), success_sum / n);
        report.metrics.insert("steps".to_string(), steps_sum / n);
        report
            .metrics
            .insert("path_ratio".to_string(), path_sum / n);
        Ok(report)
    }

    fn update_error(&self) -> bool {
        self.update_error
    }

    fn save_checkpoint(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct Checkpoint<'a> {
            explore_steps: u64,
            update_steps: u64,
            skill: f64,
            current_lr: f64,
            hyperparams: &'a AgentHyperparams,
        }
        let checkpoint = Checkpoint {
            explore_steps: self.explore_steps,
            update_steps: self.update_steps,
            skill: self.skill(),
            current_lr: self.current_lr(),
            hyperparams: &self.hyper,
        };
        let json = serde_json::to_string_pretty(&checkpoint)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.replay_len = 0;
            tracing::info!(
                explore_steps = self.explore_steps,
                update_steps = self.update_steps,
                "agent closed"
            );
        }
        Ok(())
    }
}
