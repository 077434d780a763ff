//! Hyperparameter search for guidewire navigation across type-I arch
//! variations.
//!
//! Runs a sequential random-sampler study over the SAC-style agent's
//! hyperparameters. Underperforming trials are pruned early by a combined
//! median/threshold/stagnation pruner.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin optimize_arch_variety --release -- --n_worker 5 -d cpu -n run
//! ```

use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::Parser;

use cathsim_rl::agent::{AgentSettings, SynchronAgent};
use cathsim_rl::config::{AgentHyperparams, TrainingSchedule};
use cathsim_rl::device::Device;
use cathsim_rl::env::{ArchVariety, EnvMode, VesselEnv};
use cathsim_rl::logging;
use cathsim_rl::paths::RunPaths;
use cathsim_rl::runner::{CycleDecision, CycleHook, RunOutcome, Runner, RunnerSettings};
use cathsim_rl::search::{
    CombinationPruner, MedianPruner, Pruner, StagnatingPruner, Study, ThresholdPruner,
    TrialContext, TrialOutcome,
};

const RESULTS_FOLDER: &str = "results/eve_paper/neurovascular/aorta/gw_only/typeI_hyperparam_opti";

const EVAL_SEEDS: &[u64] = &[
    1, 2, 3, 5, 6, 7, 8, 9, 10, 12, 13, 14, 16, 17, 18, 21, 22, 23, 27, 31, 34, 35, 37, 39, 42,
    43, 44, 47, 48, 50, 52, 55, 56, 58, 61, 62, 63, 68, 69, 70, 71, 73, 79, 80, 81, 84, 89, 91,
    92, 93, 95, 97, 102, 103, 108, 109, 110, 115, 116, 117, 118, 120, 122, 123, 124, 126, 127,
    128, 129, 130, 131, 132, 134, 136, 138, 139, 140, 141, 142, 143, 144, 147, 148, 149, 150,
    151, 152, 154, 155, 156, 158, 159, 161, 162, 167, 168, 171, 175,
];

const HEATUP_STEPS: u64 = 500_000;
const TRAINING_STEPS: u64 = 10_000_000;
const CONSECUTIVE_EXPLORE_EPISODES: u64 = 100;
const EXPLORE_STEPS_BTW_EVAL: u64 = 500_000;
const N_TRIALS: usize = 20;

fn parse_device(s: &str) -> Result<Device, String> {
    const CHOICES: [&str; 5] = ["cpu", "cuda:0", "cuda:1", "cuda", "mps"];
    if !CHOICES.contains(&s) {
        return Err(format!("device must be one of {CHOICES:?}"));
    }
    s.parse::<Device>().map_err(|e| e.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "optimize_arch_variety",
    about = "Hyperparameter search for guidewire navigation in type-I arch variations",
    version
)]
struct Args {
    /// Number of exploration workers
    #[arg(long = "n_worker", alias = "nw", default_value_t = 5)]
    n_worker: usize,

    /// Device of the trainer, where the network update is performed
    #[arg(short = 'd', long, default_value = "cpu", value_parser = parse_device)]
    device: Device,

    /// Evaluate with the stochastic policy head instead of the mean action
    #[arg(long = "stochastic_eval", alias = "se")]
    stochastic_eval: bool,

    /// Name of the search run
    #[arg(short = 'n', long, default_value = "run")]
    name: String,
}

/// Bridges the runner's per-cycle decision point to the study's pruner:
/// report the quality, then pass the combined verdict back.
struct PruneHook<'a, 'b> {
    trial: &'a mut TrialContext<'b>,
}

impl CycleHook for PruneHook<'_, '_> {
    fn after_eval(&mut self, quality: f64, exploration_steps: u64) -> CycleDecision {
        self.trial.report(quality, exploration_steps);
        if self.trial.should_prune() {
            CycleDecision::Prune
        } else {
            CycleDecision::Continue
        }
    }
}

fn run_trial(trial: &mut TrialContext, results_root: &Path, args: &Args) -> Result<TrialOutcome> {
    // configuration artifacts are written before any training step, so a
    // crashed trial still leaves a reproducible setup behind
    let paths = RunPaths::resolve(results_root, &args.name)?;

    logging::scoped_file_logging(&paths.log_file, || -> Result<TrialOutcome> {
        let lr = trial.suggest_float("lr", 8e-5, 2e-3, true);
        let n_hidden_layer = trial.suggest_int("n_hidden_layer", 2, 4, 1);
        let hidden_layer_nodes = trial.suggest_int("hidden_layer_nodes", 300, 900, 100);
        let embedder_nodes = trial.suggest_int("embedder_nodes", 200, 700, 100);
        let embedder_layers = trial.suggest_int("embedder_layers", 1, 2, 1);

        let hyper = AgentHyperparams::default()
            .learning_rate(lr)
            .hidden_layers(vec![hidden_layer_nodes as u32; n_hidden_layer as usize])
            .embedder_nodes(embedder_nodes as u32)
            .embedder_layers(embedder_layers as u32);

        let schedule = TrainingSchedule::new()
            .heatup_steps(HEATUP_STEPS)
            .training_steps(TRAINING_STEPS)
            .explore_steps_between_eval(EXPLORE_STEPS_BTW_EVAL)
            .consecutive_explore_episodes(CONSECUTIVE_EXPLORE_EPISODES);

        tracing::info!(
            trial = trial.id(),
            lr,
            n_hidden_layer,
            hidden_layer_nodes,
            embedder_nodes,
            embedder_layers,
            "starting trial"
        );

        let env_train = VesselEnv::new(ArchVariety::new(1), EnvMode::Train);
        let env_eval = VesselEnv::new(ArchVariety::new(1), EnvMode::Eval);
        env_train.save_config(&paths.config_folder.join("env_train.json"))?;
        env_eval.save_config(&paths.config_folder.join("env_eval.json"))?;
        let info_results = env_eval.info_keys();

        let agent = SynchronAgent::new(
            AgentSettings {
                trainer_device: args.device,
                worker_device: Device::Cpu,
                n_worker: args.n_worker,
                stochastic_eval: args.stochastic_eval,
            },
            hyper.clone(),
            env_train,
            env_eval,
        )?;

        let mut runner = Runner::new(
            agent,
            RunnerSettings {
                heatup_action_low: vec![-10.0, -1.0],
                heatup_action_high: vec![25.0, 3.14],
                agent_parameters: serde_json::json!({
                    "learning_rate": lr,
                    "hidden_layers": hyper.hidden_layers.clone(),
                    "embedder_nodes": embedder_nodes,
                    "embedder_layers": embedder_layers,
                    "heatup_steps": schedule.heatup_steps,
                    "explore_steps_between_eval": schedule.explore_steps_between_eval,
                    "consecutive_explore_episodes": schedule.consecutive_explore_episodes,
                    "batch_size": hyper.batch_size,
                    "update_per_explore_step": schedule.update_per_explore_step,
                }),
                checkpoint_folder: paths.checkpoint_folder.clone(),
                results_file: paths.results_file.clone(),
                info_results,
                quality_info: "success".to_string(),
            },
        )?;
        runner.save_config(&paths.config_folder.join("runner.json"))?;

        let mut hook = PruneHook {
            trial: &mut *trial,
        };
        let outcome = runner.run(&schedule, EVAL_SEEDS, &mut hook)?;
        runner.close()?;

        match outcome {
            RunOutcome::Pruned { last_quality } => {
                tracing::info!(trial = trial.id(), last_quality, "trial pruned");
                Ok(TrialOutcome::Pruned)
            }
            RunOutcome::Completed { quality, .. } | RunOutcome::Degraded { quality, .. } => {
                Ok(TrialOutcome::Complete(quality))
            }
        }
    })?
}

fn main() -> Result<()> {
    let args = Args::parse();

    let results_root = std::env::current_dir()?.join(RESULTS_FOLDER);
    fs::create_dir_all(&results_root)?;
    logging::init_run_logging(&results_root.join("main.log"))?;

    let pruner = CombinationPruner::new(vec![
        Box::new(MedianPruner::new(5, TRAINING_STEPS / 5)) as Box<dyn Pruner>,
        Box::new(ThresholdPruner::new(0.2, TRAINING_STEPS / 3)),
        Box::new(StagnatingPruner::new(0.01, TRAINING_STEPS / 4, 10, 5)),
    ]);
    let mut study =
        Study::new(Box::new(pruner)).with_state_file(results_root.join("study.json"));

    study.optimize(N_TRIALS, |trial| run_trial(trial, &results_root, &args))?;

    if let Some(best) = study.best_trial() {
        tracing::info!(
            trial = best.id,
            value = ?best.final_value(),
            params = ?best.params,
            "search finished"
        );
    } else {
        tracing::warn!("search finished without a completed trial");
    }
    Ok(())
}
