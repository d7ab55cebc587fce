//! Node configuration.

use curtain_tick::TickConfig;

/// Settings shared by authority and follower nodes.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// The playback tick. Effects advance only on ticks, so this is the
    /// animation frame rate. Defaults to 60 Hz.
    pub tick: TickConfig,

    /// How long the authority waits for a connecting channel's `Join`
    /// before dropping it (seconds).
    pub handshake_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::with_rate(60),
            handshake_timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ticks_at_60hz() {
        let config = NodeConfig::default();
        assert_eq!(config.tick.rate_hz, 60);
        assert_eq!(config.handshake_timeout_secs, 5);
    }
}
