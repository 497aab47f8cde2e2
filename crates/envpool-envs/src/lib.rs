//! Built-in environments for envpool.
//!
//! Small, dependency-free environments for testing and benchmarking pools:
//! - `Catch` - Falling ball caught by a paddle
//! - `CartPole` - Classic control
//! - `Bandit` - Multi-armed bandit
//!
//! [`registry`] builds pools of any of them by name.

mod bandit;
mod cartpole;
mod catch;
pub mod registry;

pub use bandit::{Bandit, BanditConfig};
pub use cartpole::{CartPole, CartPoleConfig};
pub use catch::{Catch, CatchConfig};

use envpool::EnvError;
use ndarray::ArrayViewD;

/// Decode the single value of a `Discrete` action
fn discrete_action(action: ArrayViewD<'_, f32>) -> Result<usize, EnvError> {
    action
        .iter()
        .next()
        .filter(|v| v.is_finite() && **v >= 0.0)
        .map(|v| *v as usize)
        .ok_or_else(|| EnvError::InvalidState(format!("bad discrete action {action:?}")))
}
