/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Total number of attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for every further attempt.
    pub initial_delay_ms: u64,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            max_attempts: 3,
            initial_delay_ms: 1_500,
        }
    }
}
