//! Broker configuration — ambient CLI/env surface around the core
//! design. `spec.md` §1 explicitly places "the command-line entrypoint
//! and environment-variable configuration parsing" out of scope for the
//! core; this module is the ambient stack that wraps it, grounded on
//! `tallow-relay`'s `RelayConfig`/`Cli` split.

use std::time::Duration;

use clap::Parser;

/// Room-expiry default (`spec.md` §6): 10 minutes.
pub const DEFAULT_ROOM_EXPIRY_MS: u64 = 600_000;

/// Heartbeat period default (`spec.md` §4.1, §6): 30 seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Expiry sweep period default (`spec.md` §4.1: "a recurring sweep
/// (period ≤ 60s)").
pub const DEFAULT_SWEEP_SECS: u64 = 30;

/// Runtime configuration for the broker binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "dropcast-broker", about = "WebSocket signaling broker for browser-to-browser file transfer")]
pub struct BrokerConfig {
    /// Address to bind the WebSocket/HTTP listener on.
    #[arg(long, env = "DROPCAST_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Room time-to-live in milliseconds (`ROOM_EXPIRY`).
    #[arg(long, env = "DROPCAST_ROOM_EXPIRY_MS", default_value_t = DEFAULT_ROOM_EXPIRY_MS)]
    pub room_expiry_ms: u64,

    /// Heartbeat ping period in seconds.
    #[arg(long, env = "DROPCAST_HEARTBEAT_SECS", default_value_t = DEFAULT_HEARTBEAT_SECS)]
    pub heartbeat_secs: u64,

    /// Expiry sweep period in seconds; must be `<= 60` per `spec.md`
    /// §4.1, clamped if a caller provides a larger value.
    #[arg(long, env = "DROPCAST_SWEEP_SECS", default_value_t = DEFAULT_SWEEP_SECS)]
    pub sweep_secs: u64,
}

impl BrokerConfig {
    /// Clamp out-of-range values to the nearest valid bound, logging a
    /// warning for anything adjusted.
    pub fn validate(mut self) -> Self {
        if self.sweep_secs > 60 {
            tracing::warn!(
                requested = self.sweep_secs,
                "sweep_secs exceeds the 60s bound from spec.md §4.1, clamping"
            );
            self.sweep_secs = 60;
        }
        if self.sweep_secs == 0 {
            self.sweep_secs = 1;
        }
        if self.heartbeat_secs == 0 {
            self.heartbeat_secs = DEFAULT_HEARTBEAT_SECS;
        }
        self
    }

    pub fn room_expiry(&self) -> Duration {
        Duration::from_millis(self.room_expiry_ms)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_secs)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            room_expiry_ms: DEFAULT_ROOM_EXPIRY_MS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            sweep_secs: DEFAULT_SWEEP_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_clamps_oversized_sweep_period() {
        let config = BrokerConfig {
            sweep_secs: 120,
            ..Default::default()
        }
        .validate();
        assert_eq!(config.sweep_secs, 60);
    }

    #[test]
    fn defaults_match_spec_tunables() {
        let config = BrokerConfig::default();
        assert_eq!(config.room_expiry_ms, 600_000);
        assert_eq!(config.heartbeat_secs, 30);
    }
}
