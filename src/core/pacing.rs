//! Post-turn pacing.
//!
//! Every turn ends with a pause. When the pause is non-zero a random jitter
//! is added so the far end never sees a mechanically regular cadence. The
//! base delay and the jitter window are configured independently.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Pacing policy applied after each turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    /// Delay used when an action does not specify one (default: 1000ms)
    #[serde(default = "default_post_delay_ms")]
    pub default_post_delay_ms: u64,

    /// Lower bound of the jitter window, inclusive (default: 100ms)
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,

    /// Upper bound of the jitter window, exclusive (default: 1000ms)
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

fn default_post_delay_ms() -> u64 {
    1000
}
fn default_jitter_min_ms() -> u64 {
    100
}
fn default_jitter_max_ms() -> u64 {
    1000
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            default_post_delay_ms: default_post_delay_ms(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

impl Pacing {
    /// No pauses at all (useful for tests and dry runs)
    pub fn immediate() -> Self {
        Self {
            default_post_delay_ms: 0,
            jitter_min_ms: 0,
            jitter_max_ms: 0,
        }
    }

    /// Base delay for an action, before jitter
    pub fn base_delay(&self, post_delay: Option<Duration>) -> Duration {
        post_delay.unwrap_or(Duration::from_millis(self.default_post_delay_ms))
    }

    /// Draw a jitter value from the configured window
    pub fn jitter(&self) -> Duration {
        if self.jitter_max_ms <= self.jitter_min_ms {
            return Duration::from_millis(self.jitter_min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.jitter_min_ms..self.jitter_max_ms);
        Duration::from_millis(ms)
    }

    /// Total pause after a turn. Zero stays zero; jitter only pads real pauses.
    pub fn delay_for(&self, post_delay: Option<Duration>) -> Duration {
        let base = self.base_delay(post_delay);
        if base.is_zero() {
            return Duration::ZERO;
        }
        base + self.jitter()
    }
}
