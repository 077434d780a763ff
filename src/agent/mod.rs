//! Agent capability seam
//!
//! The runner drives an agent through this trait. The shipped implementation
//! is [`SynchronAgent`]; tests drive the control loop with mocks instead of
//! a real learning stack.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

pub mod synchron;

pub use synchron::{AgentSettings, SynchronAgent};

/// Outcome of a heatup phase
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatupReport {
    /// Environment steps collected with random actions
    pub steps: u64,
    /// Episodes played
    pub episodes: u64,
}

/// Outcome of one explore burst
#[derive(Debug, Clone, Copy, Default)]
pub struct ExploreReport {
    /// Exploration steps collected
    pub steps: u64,
    /// Episodes played
    pub episodes: u64,
    /// Mean undiscounted episode return
    pub mean_reward: f64,
}

/// Outcome of a batch of learning updates
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateReport {
    /// Update steps actually performed
    pub steps: u64,
}

/// Outcome of one evaluation pass over the fixed seed list
#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    /// Mean undiscounted episode return across seeds
    pub mean_reward: f64,
    /// Aggregated episode metrics (means across seeds), keyed by the
    /// environment's info keys
    pub metrics: HashMap<String, f64>,
}

impl EvalReport {
    /// Look up a metric by name
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// A synchronous learning agent as seen by the runner.
///
/// Every method blocks until the phase it names has finished. `update_error`
/// is a soft-degradation flag: the agent keeps answering calls, the caller
/// decides to stop.
pub trait Agent: Send {
    /// Collect `steps` environment steps with uniform random actions in
    /// `[action_low, action_high]`, filling the replay buffer
    fn heatup(&mut self, steps: u64, action_low: &[f64], action_high: &[f64])
        -> Result<HeatupReport>;

    /// Play up to `consecutive_episodes` exploration episodes, stopping
    /// early once `step_limit` steps were collected
    fn explore(&mut self, consecutive_episodes: u64, step_limit: u64) -> Result<ExploreReport>;

    /// Perform `steps` learning-update steps
    fn update(&mut self, steps: u64) -> Result<UpdateReport>;

    /// Evaluate the current policy on the given seeds, in order
    fn eval(&mut self, seeds: &[u64]) -> Result<EvalReport>;

    /// Whether an internal update fault was observed
    fn update_error(&self) -> bool;

    /// Snapshot the agent state to a checkpoint file
    fn save_checkpoint(&self, path: &Path) -> Result<()>;

    /// Release workers, buffers, and device memory
    fn close(&mut self) -> Result<()>;
}

/// Owns an agent and guarantees `close` runs exactly once.
///
/// An explicit [`AgentGuard::close`] is idempotent; if it never happens,
/// `Drop` closes instead. Either way the agent is released on every exit
/// path without a double release.
#[derive(Debug)]
pub struct AgentGuard<A: Agent> {
    agent: A,
    closed: bool,
}

impl<A: Agent> AgentGuard<A> {
    /// Wrap an agent
    pub fn new(agent: A) -> Self {
        Self {
            agent,
            closed: false,
        }
    }

    /// Release the agent's resources; later calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.agent.close()
    }

    /// Whether the agent was already released
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Access the wrapped agent
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Mutable access to the wrapped agent
    pub fn agent_mut(&mut self) -> &mut A {
        &mut self.agent
    }
}

impl<A: Agent> Drop for AgentGuard<A> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.agent.close() {
                tracing::warn!("agent close during drop failed: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingAgent {
        closes: Arc<AtomicUsize>,
    }

    impl Agent for CountingAgent {
        fn heatup(&mut self, steps: u64, _: &[f64], _: &[f64]) -> Result<HeatupReport> {
            Ok(HeatupReport { steps, episodes: 1 })
        }
        fn explore(&mut self, _: u64, step_limit: u64) -> Result<ExploreReport> {
            Ok(ExploreReport {
                steps: step_limit,
                episodes: 1,
                mean_reward: 0.0,
            })
        }
        fn update(&mut self, steps: u64) -> Result<UpdateReport> {
            Ok(UpdateReport { steps })
        }
        fn eval(&mut self, _: &[u64]) -> Result<EvalReport> {
            Ok(EvalReport::default())
        }
        fn update_error(&self) -> bool {
            false
        }
        fn save_checkpoint(&self, _: &Path) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_guard_closes_once_explicitly() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut guard = AgentGuard::new(CountingAgent {
            closes: closes.clone(),
        });
        guard.close().unwrap();
        guard.close().unwrap();
        drop(guard);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        let guard = AgentGuard::new(CountingAgent {
            closes: closes.clone(),
        });
        drop(guard);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
