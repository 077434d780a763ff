//! Fixed-hyperparameter training run for guidewire navigation across type-I
//! arch variations.
//!
//! One long training run: heatup, then explore/update/eval cycles over the
//! full step budget, evaluating on the fixed seed list every 250k steps.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin train_arch_variety --release -- --n_worker 2 -d cpu -n test
//! ```

use std::fs;

use anyhow::Result;
use clap::Parser;

use cathsim_rl::agent::{AgentSettings, SynchronAgent};
use cathsim_rl::config::{AgentHyperparams, TrainingSchedule};
use cathsim_rl::device::Device;
use cathsim_rl::env::{ArchVariety, EnvMode, VesselEnv};
use cathsim_rl::logging;
use cathsim_rl::paths::RunPaths;
use cathsim_rl::runner::{Runner, RunnerSettings};

const RESULTS_FOLDER: &str = "results/eve_paper/neurovascular/aorta/gw_only/arch_vmr_94";

const EVAL_SEEDS: &[u64] = &[
    1, 2, 3, 5, 6, 7, 8, 9, 10, 12, 13, 14, 16, 17, 18, 21, 22, 23, 27, 31, 34, 35, 37, 39, 42,
    43, 44, 47, 48, 50, 52, 55, 56, 58, 61, 62, 63, 68, 69, 70, 71, 73, 79, 80, 81, 84, 89, 91,
    92, 93, 95, 97, 102, 103, 108, 109, 110, 115, 116, 117, 118, 120, 122, 123, 124, 126, 127,
    128, 129, 130, 131, 132, 134, 136, 138, 139, 140, 141, 142, 143, 144, 147, 148, 149, 150,
    151, 152, 154, 155, 156, 158, 159, 161, 162, 167, 168, 171, 175,
];

const HEATUP_STEPS: u64 = 500_000;
const TRAINING_STEPS: u64 = 20_000_000;
const CONSECUTIVE_EXPLORE_EPISODES: u64 = 100;
const EXPLORE_STEPS_BTW_EVAL: u64 = 250_000;

fn parse_device(s: &str) -> Result<Device, String> {
    const CHOICES: [&str; 4] = ["cpu", "cuda:0", "cuda:1", "cuda"];
    if !CHOICES.contains(&s) {
        return Err(format!("device must be one of {CHOICES:?}"));
    }
    s.parse::<Device>().map_err(|e| e.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "train_arch_variety",
    about = "Fixed-hyperparameter training run for guidewire navigation",
    version
)]
struct Args {
    /// Number of exploration workers
    #[arg(long = "n_worker", alias = "nw", default_value_t = 2)]
    n_worker: usize,

    /// Device of the trainer, where the network update is performed
    #[arg(short = 'd', long, default_value = "cpu", value_parser = parse_device)]
    device: Device,

    /// Evaluate with the stochastic policy head instead of the mean action
    #[arg(long = "stochastic_eval", alias = "se")]
    stochastic_eval: bool,

    /// Name of the training run
    #[arg(short = 'n', long, default_value = "test")]
    name: String,

    /// Learning rate of the optimizers
    #[arg(
        long = "learning_rate",
        alias = "lr",
        default_value_t = 0.0003217978434614328
    )]
    learning_rate: f64,

    /// Hidden-layer widths
    #[arg(long, num_args = 1.., default_values_t = [400u32, 400, 400])]
    hidden: Vec<u32>,

    /// Number of nodes per layer in the embedder
    #[arg(long = "embedder_nodes", alias = "en", default_value_t = 700)]
    embedder_nodes: u32,

    /// Number of layers in the embedder
    #[arg(long = "embedder_layers", alias = "el", default_value_t = 1)]
    embedder_layers: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let results_root = std::env::current_dir()?.join(RESULTS_FOLDER);
    fs::create_dir_all(&results_root)?;
    let paths = RunPaths::resolve(&results_root, &args.name)?;
    logging::init_run_logging(&paths.log_file)?;

    let hyper = AgentHyperparams::default()
        .learning_rate(args.learning_rate)
        .hidden_layers(args.hidden.clone())
        .embedder_nodes(args.embedder_nodes)
        .embedder_layers(args.embedder_layers);

    let schedule = TrainingSchedule::new()
        .heatup_steps(HEATUP_STEPS)
        .training_steps(TRAINING_STEPS)
        .explore_steps_between_eval(EXPLORE_STEPS_BTW_EVAL)
        .consecutive_explore_episodes(CONSECUTIVE_EXPLORE_EPISODES);

    // the eval environment gets a deep copy of the intervention: identical
    // starting configuration, independent state from here on
    let intervention = ArchVariety::default();
    let intervention_eval = intervention.clone();

    let env_train = VesselEnv::new(intervention, EnvMode::Train);
    let env_eval = VesselEnv::new(intervention_eval, EnvMode::Eval);
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
                "lr": args.learning_rate,
                "hidden_layers": args.hidden,
                "embedder_nodes": args.embedder_nodes,
                "embedder_layers": args.embedder_layers,
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

    let summary = runner.training_run(&schedule, EVAL_SEEDS)?;
    runner.close()?;

    tracing::info!(
        reward = summary.reward,
        success = summary.success,
        "training run finished"
    );
    Ok(())
}
