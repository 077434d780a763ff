//! Environment traits and the simulated catheterization backend
//!
//! This module defines the environment seam the runner and agent are written
//! against, plus the built-in guidewire-navigation simulation used by the
//! drivers and tests.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod intervention;
pub mod vessel;

pub use intervention::{ArchVariety, Intervention, Scenario};
pub use vessel::{EnvConfig, VesselEnv};

/// Core trait for simulation environments
pub trait Environment {
    /// Observation type
    type Observation;

    /// Action type
    type Action;

    /// Reset the environment and return the initial observation.
    ///
    /// A `Some(seed)` makes the episode deterministic; `None` lets the
    /// environment draw its own episode variation.
    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation>;

    /// Step the environment with an action
    fn step(&mut self, action: &Self::Action) -> Result<StepResult<Self::Observation>>;

    /// Get the observation space description
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space description
    fn action_space(&self) -> SpaceInfo;
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult<O> {
    /// Next observation
    pub observation: O,

    /// Reward received
    pub reward: f64,

    /// Whether the episode terminated (target reached)
    pub terminated: bool,

    /// Whether the episode was truncated (step cap hit)
    pub truncated: bool,

    /// Per-step info metrics, keyed by the environment's info keys
    pub info: HashMap<String, f64>,
}

/// Space information for observations and actions
#[derive(Debug, Clone)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Kind of the space
    pub space_type: SpaceType,
}

/// Space kinds
#[derive(Debug, Clone)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous box with per-dimension bounds
    Continuous {
        /// Lower bound per dimension
        low: Vec<f64>,
        /// Upper bound per dimension
        high: Vec<f64>,
    },
}

/// Whether an environment instance serves exploration or evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvMode {
    /// Exploration environment: scenario variation per the intervention
    Train,
    /// Evaluation environment: seed-deterministic episodes
    Eval,
}
