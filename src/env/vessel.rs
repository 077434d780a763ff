//! Guidewire navigation simulation
//!
//! A deliberately small stand-in for the full catheterization simulator: the
//! guidewire is a point with an insertion depth and a rotation, the task is
//! to reach the target branch ostium of the current arch scenario. Dynamics
//! are deterministic given a reset seed, which is what the fixed-seed
//! evaluation protocol relies on.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{EnvMode, Environment, Intervention, Scenario, SpaceInfo, SpaceType, StepResult};

/// Lower action bounds: translation mm/s, rotation rad/s
pub const ACTION_LOW: [f64; 2] = [-10.0, -1.0];
/// Upper action bounds: translation mm/s, rotation rad/s
pub const ACTION_HIGH: [f64; 2] = [25.0, 3.14];

const DT: f64 = 0.1;
const DEPTH_SPAN: f64 = 120.0;
const DEPTH_TOLERANCE: f64 = 1.5;
const ANGLE_TOLERANCE: f64 = 0.1;
const SUCCESS_BONUS: f64 = 10.0;
const STEP_PENALTY: f64 = 0.01;

fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle;
    while a > PI {
        a -= 2.0 * PI;
    }
    while a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Serializable environment configuration, written to the run's config folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Train or eval mode
    pub mode: EnvMode,
    /// Per-episode step cap
    pub max_episode_steps: u64,
    /// Lower action bounds
    pub action_low: [f64; 2],
    /// Upper action bounds
    pub action_high: [f64; 2],
    /// Intervention configuration snapshot
    pub intervention: serde_json::Value,
}

/// Simulated vessel environment for guidewire navigation
#[derive(Debug, Clone)]
pub struct VesselEnv<I: Intervention> {
    mode: EnvMode,
    intervention: I,
    scenario: Scenario,
    depth: f64,
    rotation: f64,
    distance: f64,
    initial_distance: f64,
    episode_steps: u64,
    episodes: u64,
    max_episode_steps: u64,
    rng: SmallRng,
}

impl<I: Intervention> VesselEnv<I> {
    /// Create an environment around an intervention strategy
    pub fn new(intervention: I, mode: EnvMode) -> Self {
        let scenario = intervention.scenario_for_seed(0);
        let mut env = Self {
            mode,
            intervention,
            scenario,
            depth: 0.0,
            rotation: 0.0,
            distance: 0.0,
            initial_distance: 1.0,
            episode_steps: 0,
            episodes: 0,
            max_episode_steps: 200,
            rng: SmallRng::seed_from_u64(0),
        };
        env.place_guidewire(0);
        env
    }

    /// Override the per-episode step cap
    pub fn max_episode_steps(mut self, steps: u64) -> Self {
        self.max_episode_steps = steps;
        self
    }

    /// The environment's mode
    pub fn mode(&self) -> EnvMode {
        self.mode
    }

    /// Scenario of the current episode
    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Names of the metrics reported through step info
    pub fn info_keys(&self) -> Vec<String> {
        vec![
            "success".to_string(),
            "steps".to_string(),
            "path_ratio".to_string(),
        ]
    }

    /// Serialize the environment configuration to a JSON file
    pub fn save_config(&self, path: &Path) -> Result<()> {
        let config = EnvConfig {
            mode: self.mode,
            max_episode_steps: self.max_episode_steps,
            action_low: ACTION_LOW,
            action_high: ACTION_HIGH,
            intervention: self.intervention.config(),
        };
        let json = serde_json::to_string_pretty(&config)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn distance_to_target(&self) -> f64 {
        let depth_err = (self.scenario.target_depth - self.depth).abs() / DEPTH_SPAN;
        let angle_err = wrap_angle(self.scenario.branch_angle - self.rotation).abs() / PI;
        depth_err + angle_err
    }

    fn at_target(&self) -> bool {
        (self.scenario.target_depth - self.depth).abs() <= DEPTH_TOLERANCE
            && wrap_angle(self.scenario.branch_angle - self.rotation).abs() <= ANGLE_TOLERANCE
    }

    fn observation(&self) -> [f64; 4] {
        [
            self.depth / DEPTH_SPAN,
            self.rotation,
            (self.scenario.target_depth - self.depth) / DEPTH_SPAN,
            wrap_angle(self.scenario.branch_angle - self.rotation),
        ]
    }

    fn place_guidewire(&mut self, _seed: u64) {
        self.depth = 5.0 + self.rng.gen_range(0.0..2.0);
        self.rotation = self.rng.gen_range(-0.1..0.1);
        self.episode_steps = 0;
        self.distance = self.distance_to_target();
        self.initial_distance = self.distance.max(1e-6);
    }
}

impl<I: Intervention> Environment for VesselEnv<I> {
    type Observation = [f64; 4];
    type Action = [f64; 2];

    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation> {
        self.episodes += 1;
        match seed {
            Some(seed) => {
                self.scenario = self.intervention.scenario_for_seed(seed);
                self.rng = SmallRng::seed_from_u64(seed);
            }
            None => {
                self.scenario = self.intervention.next_scenario();
                self.rng = SmallRng::seed_from_u64(self.episodes.wrapping_mul(0x9E37_79B9));
            }
        }
        self.place_guidewire(seed.unwrap_or(self.episodes));
        Ok(self.observation())
    }

    fn step(&mut self, action: &Self::Action) -> Result<StepResult<Self::Observation>> {
        let translation = action[0].clamp(ACTION_LOW[0], ACTION_HIGH[0]);
        let rotation_rate = action[1].clamp(ACTION_LOW[1], ACTION_HIGH[1]);

        // Tortuosity damps advancement; rotation is unaffected.
        let effectiveness = 1.0 - 0.5 * self.scenario.tortuosity;
        self.depth = (self.depth + translation * DT * effectiveness).clamp(0.0, DEPTH_SPAN);
        self.rotation = wrap_angle(self.rotation + rotation_rate * DT);
        self.episode_steps += 1;

        let new_distance = self.distance_to_target();
        let terminated = self.at_target();
        let truncated = !terminated && self.episode_steps >= self.max_episode_steps;

        let mut reward = (self.distance - new_distance) * 10.0 - STEP_PENALTY;
        if terminated {
            reward += SUCCESS_BONUS;
        }
        self.distance = new_distance;

        let mut info = HashMap::new();
        info.insert("success".to_string(), if terminated { 1.0 } else { 0.0 });
        info.insert("steps".to_string(), self.episode_steps as f64);
        info.insert(
            "path_ratio".to_string(),
            ((self.initial_distance - new_distance) / self.initial_distance).clamp(0.0, 1.0),
        );

        Ok(StepResult {
            observation: self.observation(),
            reward,
            terminated,
            truncated,
            info,
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo {
            shape: vec![4],
            space_type: SpaceType::Continuous {
                low: vec![0.0, -PI, -1.0, -PI],
                high: vec![1.0, PI, 1.0, PI],
            },
        }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo {
            shape: vec![2],
            space_type: SpaceType::Continuous {
                low: ACTION_LOW.to_vec(),
                high: ACTION_HIGH.to_vec(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ArchVariety;

    fn test_env(mode: EnvMode) -> VesselEnv<ArchVariety> {
        VesselEnv::new(ArchVariety::new(1), mode)
    }

    #[test]
    fn test_seeded_reset_is_deterministic() {
        let mut a = test_env(EnvMode::Eval);
        let mut b = test_env(EnvMode::Eval);
        let obs_a = a.reset(Some(42)).unwrap();
        let obs_b = b.reset(Some(42)).unwrap();
        assert_eq!(obs_a, obs_b);

        // identical action sequences give identical trajectories
        for _ in 0..20 {
            let ra = a.step(&[5.0, 0.2]).unwrap();
            let rb = b.step(&[5.0, 0.2]).unwrap();
            assert_eq!(ra.observation, rb.observation);
            assert_eq!(ra.reward, rb.reward);
        }
    }

    #[test]
    fn test_progress_toward_target_rewards() {
        let mut env = test_env(EnvMode::Train);
        let obs = env.reset(Some(3)).unwrap();
        // advance toward the target: positive depth delta means push forward
        let toward = if obs[2] > 0.0 { 10.0 } else { -5.0 };
        let result = env.step(&[toward, 0.0]).unwrap();
        assert!(result.reward > -STEP_PENALTY);
    }

    #[test]
    fn test_episode_truncates_at_step_cap() {
        let mut env = test_env(EnvMode::Train).max_episode_steps(5);
        env.reset(Some(1)).unwrap();
        let mut last = None;
        for _ in 0..5 {
            last = Some(env.step(&[0.0, 0.0]).unwrap());
        }
        let last = last.unwrap();
        assert!(last.truncated);
        assert!(!last.terminated);
        assert_eq!(last.info["steps"], 5.0);
    }

    #[test]
    fn test_config_serialization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env_train.json");
        let env = test_env(EnvMode::Train);
        env.save_config(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let config: EnvConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(config.mode, EnvMode::Train);
        assert_eq!(config.action_low, ACTION_LOW);
    }

    #[test]
    fn test_info_keys_cover_step_info() {
        let mut env = test_env(EnvMode::Train);
        env.reset(None).unwrap();
        let result = env.step(&[1.0, 0.0]).unwrap();
        for key in env.info_keys() {
            assert!(result.info.contains_key(&key), "missing info key {key}");
        }
    }
}
