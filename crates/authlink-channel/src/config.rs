use std::time::Duration;

/// Name of the cookie carrying the static proof.
pub const DEFAULT_CREDENTIAL_NAME: &str = "connectKey";

/// Timing and naming parameters of a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Time from transport open to `challenge_accepted`.
    pub handshake_timeout: Duration,
    /// Consecutive failed attempts after which the reconnect loop gives up.
    pub max_attempts: u32,
    /// Fixed part of the delay between attempts.
    pub backoff_base: Duration,
    /// Added to the delay once per consecutive failure.
    pub backoff_step: Duration,
    /// Time to wait for `set_auth_result`.
    pub rotation_timeout: Duration,
    /// Name of the out-of-band credential attached to the transport-opening request.
    pub credential_name: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_millis(7000),
            max_attempts: 10,
            backoff_base: Duration::from_millis(500),
            backoff_step: Duration::from_millis(200),
            rotation_timeout: Duration::from_millis(5000),
            credential_name: DEFAULT_CREDENTIAL_NAME.to_owned(),
        }
    }
}

impl ChannelConfig {
    /// Delay before the next attempt after `attempt` consecutive failures.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base + self.backoff_step * attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly() {
        let config = ChannelConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(700));
        assert_eq!(config.backoff(2), Duration::from_millis(900));
        assert_eq!(config.backoff(9), Duration::from_millis(2300));
    }
}
