//! # CathSim-RL
//!
//! Training orchestration for reinforcement-learning guidewire navigation in
//! simulated vascular anatomy.
//!
//! The crate sequences heatup, explore/update/eval cycles, and
//! hyperparameter search around dependency-injected capability traits
//! ([`agent::Agent`], [`env::Environment`], [`env::Intervention`]), so the
//! control loops are testable without a real learning stack. A simulated
//! synchronous agent and vessel environment back the two binary drivers,
//! `optimize_arch_variety` and `train_arch_variety`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cathsim_rl::agent::{AgentSettings, SynchronAgent};
//! use cathsim_rl::config::{AgentHyperparams, TrainingSchedule};
//! use cathsim_rl::env::{ArchVariety, EnvMode, VesselEnv};
//! use cathsim_rl::runner::{Runner, RunnerSettings};
//!
//! # fn main() -> anyhow::Result<()> {
//! let intervention = ArchVariety::new(1);
//! let env_train = VesselEnv::new(intervention.clone(), EnvMode::Train);
//! let env_eval = VesselEnv::new(intervention, EnvMode::Eval);
//! let agent = SynchronAgent::new(
//!     AgentSettings::default(),
//!     AgentHyperparams::default(),
//!     env_train,
//!     env_eval,
//! )?;
//! let mut runner = Runner::new(
//!     agent,
//!     RunnerSettings {
//!         heatup_action_low: vec![-10.0, -1.0],
//!         heatup_action_high: vec![25.0, 3.14],
//!         agent_parameters: serde_json::json!({}),
//!         checkpoint_folder: "checkpoints".into(),
//!         results_file: "results.json".into(),
//!         info_results: vec!["success".into()],
//!         quality_info: "success".into(),
//!     },
//! )?;
//! let seeds: Vec<u64> = (0..10).collect();
//! let summary = runner.training_run(&TrainingSchedule::default(), &seeds)?;
//! runner.close()?;
//! println!("success rate {}", summary.success);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Agent capability seam and the simulated synchronous agent
pub mod agent;

/// Training schedules and agent hyperparameters
pub mod config;

/// Compute device selection
pub mod device;

/// Environment traits and the simulated catheterization backend
pub mod env;

/// Log configuration for runs and trials
pub mod logging;

/// Run-artifact path resolution
pub mod paths;

/// Training run orchestration
pub mod runner;

/// Hyperparameter search: study, sampler, pruners
pub mod search;

/// Current version of cathsim-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
