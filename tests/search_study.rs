//! End-to-end hyperparameter search over the simulated agent.
//!
//! Miniature versions of the optimize driver: a study samples parameters,
//! each trial trains a [`SynchronAgent`] on a [`VesselEnv`] for a few cycles,
//! and the pruner decides through the runner's cycle hook. Asserts the
//! on-disk artifact layout a search leaves behind.

use std::path::Path;

use anyhow::Result;

use cathsim_rl::agent::{AgentSettings, SynchronAgent};
use cathsim_rl::config::{AgentHyperparams, TrainingSchedule};
use cathsim_rl::env::{ArchVariety, EnvMode, VesselEnv};
use cathsim_rl::paths::RunPaths;
use cathsim_rl::runner::{CycleDecision, CycleHook, RunOutcome, Runner, RunnerSettings};
use cathsim_rl::search::{
    CombinationPruner, Pruner, StagnatingPruner, Study, ThresholdPruner, TrialContext,
    TrialOutcome, TrialState,
};

const EVAL_SEEDS: &[u64] = &[1, 2, 3, 5, 6, 7];

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

fn mini_schedule() -> TrainingSchedule {
    TrainingSchedule::new()
        .heatup_steps(100)
        .training_steps(1_200)
        .explore_steps_between_eval(400)
        .consecutive_explore_episodes(8)
}

/// One search trial at miniature scale, laid out like the real driver:
/// per-trial run folder, config files before training, results and
/// checkpoints during it.
fn run_trial(trial: &mut TrialContext, results_root: &Path) -> Result<TrialOutcome> {
    let paths = RunPaths::resolve(results_root, "trial")?;

    let lr = trial.suggest_float("lr", 8e-5, 2e-3, true);
    let hidden_layer_nodes = trial.suggest_int("hidden_layer_nodes", 300, 900, 100);
    let hyper = AgentHyperparams::default()
        .learning_rate(lr)
        .hidden_layers(vec![hidden_layer_nodes as u32; 2]);

    let env_train = VesselEnv::new(ArchVariety::new(1), EnvMode::Train).max_episode_steps(40);
    let env_eval = VesselEnv::new(ArchVariety::new(1), EnvMode::Eval).max_episode_steps(40);
    env_train.save_config(&paths.config_folder.join("env_train.json"))?;
    env_eval.save_config(&paths.config_folder.join("env_eval.json"))?;
    let info_results = env_eval.info_keys();

    let agent = SynchronAgent::new(AgentSettings::default(), hyper, env_train, env_eval)?;
    let mut runner = Runner::new(
        agent,
        RunnerSettings {
            heatup_action_low: vec![-10.0, -1.0],
            heatup_action_high: vec![25.0, 3.14],
            agent_parameters: serde_json::json!({ "lr": lr }),
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
    let outcome = runner.run(&mini_schedule(), EVAL_SEEDS, &mut hook)?;
    runner.close()?;

    match outcome {
        RunOutcome::Pruned { .. } => Ok(TrialOutcome::Pruned),
        RunOutcome::Completed { quality, .. } | RunOutcome::Degraded { quality, .. } => {
            Ok(TrialOutcome::Complete(quality))
        }
    }
}

fn results_rows(run_folder: &Path) -> usize {
    let text = std::fs::read_to_string(run_folder.join("results.json")).unwrap();
    let log: serde_json::Value = serde_json::from_str(&text).unwrap();
    log["rows"].as_array().unwrap().len()
}

fn checkpoint_count(run_folder: &Path) -> usize {
    std::fs::read_dir(run_folder.join("checkpoints"))
        .unwrap()
        .count()
}

#[test]
fn test_mini_search_completes_and_leaves_artifacts() {
    let root = tempfile::tempdir().unwrap();

    // warmup longer than the budget: the threshold never fires
    let pruner = ThresholdPruner::new(0.0, u64::MAX);
    let mut study = Study::with_seed(Box::new(pruner), 11)
        .with_state_file(root.path().join("study.json"));

    study
        .optimize(3, |trial| run_trial(trial, root.path()))
        .unwrap();

    assert_eq!(study.trials().len(), 3);
    assert!(study
        .trials()
        .iter()
        .all(|t| matches!(t.state, TrialState::Complete { .. })));
    let best = study.best_trial().unwrap();
    assert!(best.final_value().is_some());

    // per-trial artifact layout: collision-suffixed run folders, configs
    // written before training, one results row and checkpoint per eval
    for folder in ["trial", "trial_1", "trial_2"] {
        let run_folder = root.path().join(folder);
        assert!(run_folder.join("configs/env_train.json").is_file());
        assert!(run_folder.join("configs/env_eval.json").is_file());
        assert!(run_folder.join("configs/runner.json").is_file());
        assert_eq!(results_rows(&run_folder), 3);
        assert_eq!(checkpoint_count(&run_folder), 3);
    }

    let text = std::fs::read_to_string(root.path().join("study.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(state["trials"].as_array().unwrap().len(), 3);
}

#[test]
fn test_unreachable_threshold_prunes_every_trial() {
    let root = tempfile::tempdir().unwrap();

    // success rate can never exceed 1: every trial is pruned at its first
    // evaluation
    let pruner = ThresholdPruner::new(1.1, 0);
    let mut study = Study::with_seed(Box::new(pruner), 11);

    study
        .optimize(2, |trial| run_trial(trial, root.path()))
        .unwrap();

    assert!(study
        .trials()
        .iter()
        .all(|t| matches!(t.state, TrialState::Pruned)));
    assert!(study.best_trial().is_none());

    // pruned trials stopped after one cycle
    assert_eq!(results_rows(&root.path().join("trial")), 1);
    assert_eq!(checkpoint_count(&root.path().join("trial")), 1);
}

#[test]
fn test_combined_pruner_fires_through_the_cycle_hook() {
    let root = tempfile::tempdir().unwrap();

    // only the threshold constituent can fire; the OR-composition must
    // still prune the trial
    let pruner = CombinationPruner::new(vec![
        Box::new(ThresholdPruner::new(0.0, u64::MAX)) as Box<dyn Pruner>,
        Box::new(StagnatingPruner::new(0.01, u64::MAX, 10, 5)),
        Box::new(ThresholdPruner::new(1.1, 0)),
    ]);
    let mut study = Study::with_seed(Box::new(pruner), 11);

    study
        .optimize(1, |trial| run_trial(trial, root.path()))
        .unwrap();

    assert!(matches!(study.trials()[0].state, TrialState::Pruned));
}

#[test]
fn test_same_sampler_seed_reproduces_parameters() {
    let draw = |seed: u64| {
        let mut params = Vec::new();
        let mut study = Study::with_seed(Box::new(ThresholdPruner::new(0.0, u64::MAX)), seed);
        study
            .optimize(3, |trial| {
                params.push((
                    trial.suggest_float("lr", 8e-5, 2e-3, true),
                    trial.suggest_int("hidden_layer_nodes", 300, 900, 100),
                ));
                Ok(TrialOutcome::Complete(0.0))
            })
            .unwrap();
        params
    };

    assert_eq!(draw(42), draw(42));
    assert_ne!(draw(42), draw(43));
}
