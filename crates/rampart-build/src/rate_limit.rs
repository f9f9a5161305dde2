//! Per-player sliding-window rate limiting with a burst cooldown.
//!
//! Each player keeps a queue of the timestamps of their recently accepted
//! attempts. The queue is pruned lazily on every call, so idle players cost
//! nothing. A separate minimum interval between accepted attempts rejects
//! bursts tighter than any human input.

use std::collections::{BTreeMap, VecDeque};

use serde::Deserialize;

use rampart_types::PlayerId;

/// Rate-limit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the sliding window in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Accepted attempts allowed inside one window.
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,

    /// Minimum milliseconds between two accepted attempts.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_per_window: default_max_per_window(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

const fn default_window_ms() -> u64 {
    5_000
}

const fn default_max_per_window() -> u32 {
    10
}

const fn default_min_interval_ms() -> u64 {
    250
}

/// Why an attempt was throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// The window already holds `max_per_window` attempts.
    Window {
        /// Milliseconds until the oldest attempt leaves the window.
        retry_after_ms: u64,
    },
    /// The previous accepted attempt was too recent.
    Cooldown {
        /// Milliseconds until the cooldown ends.
        retry_after_ms: u64,
    },
}

#[derive(Debug, Default)]
struct PlayerWindow {
    accepted: VecDeque<u64>,
    last_accepted: Option<u64>,
}

/// Sliding-window limiter keyed by player.
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: BTreeMap<PlayerId, PlayerWindow>,
}

impl RateLimiter {
    /// Create a limiter with the given parameters.
    pub const fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: BTreeMap::new(),
        }
    }

    /// Record an attempt at `now_ms` if the player is within limits.
    ///
    /// Rejected attempts are not recorded, so a throttled player does not
    /// extend their own penalty.
    ///
    /// # Errors
    ///
    /// Returns the [`Throttle`] that blocked the attempt.
    pub fn try_consume(&mut self, player: PlayerId, now_ms: u64) -> Result<(), Throttle> {
        let window_ms = self.config.window_ms;
        let cap = usize::try_from(self.config.max_per_window).unwrap_or(usize::MAX);
        let window = self.windows.entry(player).or_default();

        while window
            .accepted
            .front()
            .is_some_and(|&t| now_ms.saturating_sub(t) >= window_ms)
        {
            window.accepted.pop_front();
        }

        if window.accepted.len() >= cap {
            let oldest = window.accepted.front().copied().unwrap_or(now_ms);
            let retry_after_ms = oldest
                .saturating_add(window_ms)
                .saturating_sub(now_ms);
            return Err(Throttle::Window { retry_after_ms });
        }

        if let Some(last) = window.last_accepted {
            let elapsed = now_ms.saturating_sub(last);
            if elapsed < self.config.min_interval_ms {
                return Err(Throttle::Cooldown {
                    retry_after_ms: self.config.min_interval_ms.saturating_sub(elapsed),
                });
            }
        }

        window.accepted.push_back(now_ms);
        window.last_accepted = Some(now_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_per_window: u32, min_interval_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window_ms: 5_000,
            max_per_window,
            min_interval_ms,
        })
    }

    #[test]
    fn eleventh_request_in_five_seconds_is_throttled() {
        let mut rl = limiter(10, 250);
        let player = PlayerId::new();

        for i in 0..10_u64 {
            assert!(rl.try_consume(player, i * 400).is_ok(), "request {i} rejected");
        }
        let eleventh = rl.try_consume(player, 4_000);
        assert!(matches!(eleventh, Err(Throttle::Window { .. })));
    }

    #[test]
    fn window_slides_open_again() {
        let mut rl = limiter(2, 0);
        let player = PlayerId::new();
        assert!(rl.try_consume(player, 0).is_ok());
        assert!(rl.try_consume(player, 100).is_ok());
        assert_eq!(
            rl.try_consume(player, 200),
            Err(Throttle::Window {
                retry_after_ms: 4_800
            })
        );
        assert!(rl.try_consume(player, 5_000).is_ok());
    }

    #[test]
    fn cooldown_rejects_bursts() {
        let mut rl = limiter(10, 250);
        let player = PlayerId::new();
        assert!(rl.try_consume(player, 1_000).is_ok());
        assert_eq!(
            rl.try_consume(player, 1_100),
            Err(Throttle::Cooldown {
                retry_after_ms: 150
            })
        );
        assert!(rl.try_consume(player, 1_250).is_ok());
    }

    #[test]
    fn trailing_window_never_exceeds_cap() {
        let mut rl = limiter(10, 0);
        let player = PlayerId::new();
        let mut accepted: Vec<u64> = Vec::new();

        // A request every 37ms for 20 seconds.
        for step in 0..540_u64 {
            let now = step * 37;
            if rl.try_consume(player, now).is_ok() {
                accepted.push(now);
            }
        }

        for &end in &accepted {
            let in_window = accepted
                .iter()
                .filter(|&&t| t <= end && end - t < 5_000)
                .count();
            assert!(in_window <= 10, "{in_window} accepted in window ending {end}");
        }
    }

    #[test]
    fn players_are_independent() {
        let mut rl = limiter(1, 0);
        let a = PlayerId::new();
        let b = PlayerId::new();
        assert!(rl.try_consume(a, 0).is_ok());
        assert!(rl.try_consume(a, 1).is_err());
        assert!(rl.try_consume(b, 1).is_ok());
        assert!(rl.try_consume(b, 2).is_err());
    }
}
