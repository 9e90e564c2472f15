//! Hub runtime configuration.

use std::time::Duration;

/// Tunable timings for the hub's periodic maintenance.
///
/// The typing-indicator freshness and purge windows are fixed protocol
/// constants (`domain::TYPING_FRESH_WINDOW` / `domain::TYPING_PURGE_AFTER`);
/// only the liveness parameters are deployment-tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// How long a connection may stay silent before the liveness sweep
    /// force-closes it.
    pub heartbeat_timeout: Duration,
    /// Period of the liveness and typing-purge sweeps.
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        // テスト項目: デフォルト設定が想定の値になっている
        // given (前提条件):

        // when (操作):
        let config = HubConfig::default();

        // then (期待する結果):
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }
}
