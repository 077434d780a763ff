//! Training schedules and agent hyperparameters
//!
//! The drivers used to keep these values as module-level constants; they are
//! now explicit structs handed into the control loop, validated up front.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Step budgets for one training run
///
/// All counts are exploration steps except `consecutive_explore_episodes`,
/// which bounds a single explore burst in episodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSchedule {
    /// Steps of random-action data collection before any update
    pub heatup_steps: u64,

    /// Total exploration-step budget; the cycle loop stops once the
    /// exploration counter reaches this
    pub training_steps: u64,

    /// Exploration steps between two evaluation passes (one cycle)
    pub explore_steps_between_eval: u64,

    /// Episodes per explore burst within a cycle
    pub consecutive_explore_episodes: u64,

    /// Learning-update steps per exploration step
    pub update_per_explore_step: f64,
}

impl Default for TrainingSchedule {
    fn default() -> Self {
        Self {
            heatup_steps: 500_000,
            training_steps: 20_000_000,
            explore_steps_between_eval: 250_000,
            consecutive_explore_episodes: 100,
            update_per_explore_step: 1.0 / 20.0,
        }
    }
}

impl TrainingSchedule {
    /// Create a new default schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate schedule parameters
    pub fn validate(&self) -> Result<()> {
        if self.training_steps == 0 {
            return Err(anyhow!("training_steps must be positive"));
        }
        if self.explore_steps_between_eval == 0 {
            return Err(anyhow!("explore_steps_between_eval must be positive"));
        }
        if self.explore_steps_between_eval > self.training_steps {
            return Err(anyhow!(
                "explore_steps_between_eval must not exceed training_steps"
            ));
        }
        if self.consecutive_explore_episodes == 0 {
            return Err(anyhow!("consecutive_explore_episodes must be positive"));
        }
        if self.update_per_explore_step <= 0.0 {
            return Err(anyhow!("update_per_explore_step must be positive"));
        }
        Ok(())
    }

    /// Set the heatup step count
    pub fn heatup_steps(mut self, steps: u64) -> Self {
        self.heatup_steps = steps;
        self
    }

    /// Set the total training step budget
    pub fn training_steps(mut self, steps: u64) -> Self {
        self.training_steps = steps;
        self
    }

    /// Set the exploration steps between evaluations
    pub fn explore_steps_between_eval(mut self, steps: u64) -> Self {
        self.explore_steps_between_eval = steps;
        self
    }

    /// Set the episodes per explore burst
    pub fn consecutive_explore_episodes(mut self, episodes: u64) -> Self {
        self.consecutive_explore_episodes = episodes;
        self
    }

    /// Set the update-to-explore step ratio
    pub fn update_per_explore_step(mut self, ratio: f64) -> Self {
        self.update_per_explore_step = ratio;
        self
    }
}

/// Hyperparameters of the soft-actor-critic-style agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHyperparams {
    /// Optimizer learning rate
    pub learning_rate: f64,

    /// Final learning-rate factor of the linear decay
    pub lr_end_factor: f64,

    /// Exploration steps over which the learning rate decays linearly
    pub lr_linear_end_steps: u64,

    /// Hidden-layer widths of the Q/policy networks
    pub hidden_layers: Vec<u32>,

    /// Nodes per embedder layer
    pub embedder_nodes: u32,

    /// Number of embedder layers
    pub embedder_layers: u32,

    /// Discount factor
    pub gamma: f64,

    /// Minibatch size per update step
    pub batch_size: u32,

    /// Reward scaling applied before updates
    pub reward_scaling: f64,

    /// Replay buffer capacity in transitions
    pub replay_buffer_size: u64,

    /// Environment steps each chosen action is repeated for
    pub consecutive_action_steps: u32,
}

impl Default for AgentHyperparams {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            lr_end_factor: 0.15,
            lr_linear_end_steps: 6_000_000,
            hidden_layers: vec![400, 400, 400],
            embedder_nodes: 700,
            embedder_layers: 1,
            gamma: 0.99,
            batch_size: 32,
            reward_scaling: 1.0,
            replay_buffer_size: 10_000,
            consecutive_action_steps: 1,
        }
    }
}

impl AgentHyperparams {
    /// Create a new default hyperparameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate hyperparameter values
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            return Err(anyhow!("learning_rate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.lr_end_factor) {
            return Err(anyhow!("lr_end_factor must be in [0, 1]"));
        }
        if self.hidden_layers.is_empty() {
            return Err(anyhow!("hidden_layers must not be empty"));
        }
        if self.hidden_layers.iter().any(|&n| n == 0) {
            return Err(anyhow!("hidden_layers entries must be positive"));
        }
        if self.embedder_nodes == 0 {
            return Err(anyhow!("embedder_nodes must be positive"));
        }
        if self.embedder_layers == 0 {
            return Err(anyhow!("embedder_layers must be positive"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(anyhow!("gamma must be in [0, 1]"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be positive"));
        }
        if self.reward_scaling <= 0.0 {
            return Err(anyhow!("reward_scaling must be positive"));
        }
        if self.replay_buffer_size == 0 {
            return Err(anyhow!("replay_buffer_size must be positive"));
        }
        if self.consecutive_action_steps == 0 {
            return Err(anyhow!("consecutive_action_steps must be positive"));
        }
        Ok(())
    }

    /// Set the learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the hidden-layer widths
    pub fn hidden_layers(mut self, layers: Vec<u32>) -> Self {
        self.hidden_layers = layers;
        self
    }

    /// Set the embedder width
    pub fn embedder_nodes(mut self, nodes: u32) -> Self {
        self.embedder_nodes = nodes;
        self
    }

    /// Set the embedder depth
    pub fn embedder_layers(mut self, layers: u32) -> Self {
        self.embedder_layers = layers;
        self
    }

    /// Set the minibatch size
    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_valid() {
        let schedule = TrainingSchedule::default();
        assert!(schedule.validate().is_ok());
        assert_eq!(schedule.heatup_steps, 500_000);
        assert_eq!(schedule.training_steps, 20_000_000);
        assert_eq!(schedule.explore_steps_between_eval, 250_000);
    }

    #[test]
    fn test_schedule_validation() {
        let schedule = TrainingSchedule::new().training_steps(0);
        assert!(schedule.validate().is_err());

        let schedule = TrainingSchedule::new().explore_steps_between_eval(0);
        assert!(schedule.validate().is_err());

        let schedule = TrainingSchedule::new()
            .training_steps(1_000)
            .explore_steps_between_eval(2_000);
        assert!(schedule.validate().is_err());

        let schedule = TrainingSchedule::new().update_per_explore_step(0.0);
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_default_hyperparams_valid() {
        let hyper = AgentHyperparams::default();
        assert!(hyper.validate().is_ok());
        assert_eq!(hyper.gamma, 0.99);
        assert_eq!(hyper.batch_size, 32);
        assert_eq!(hyper.replay_buffer_size, 10_000);
    }

    #[test]
    fn test_hyperparam_validation() {
        let hyper = AgentHyperparams::new().learning_rate(-1.0);
        assert!(hyper.validate().is_err());

        let hyper = AgentHyperparams::new().hidden_layers(vec![]);
        assert!(hyper.validate().is_err());

        let hyper = AgentHyperparams::new().hidden_layers(vec![400, 0]);
        assert!(hyper.validate().is_err());

        let hyper = AgentHyperparams::new().embedder_layers(0);
        assert!(hyper.validate().is_err());

        let hyper = AgentHyperparams::new().batch_size(0);
        assert!(hyper.validate().is_err());
    }

    #[test]
    fn test_hyperparam_builder() {
        let hyper = AgentHyperparams::new()
            .learning_rate(8e-4)
            .hidden_layers(vec![300, 300])
            .embedder_nodes(200)
            .embedder_layers(2);

        assert_eq!(hyper.learning_rate, 8e-4);
        assert_eq!(hyper.hidden_layers, vec![300, 300]);
        assert_eq!(hyper.embedder_nodes, 200);
        assert_eq!(hyper.embedder_layers, 2);

        // untouched fields keep their defaults
        assert_eq!(hyper.gamma, 0.99);
        assert_eq!(hyper.lr_end_factor, 0.15);
    }
}
