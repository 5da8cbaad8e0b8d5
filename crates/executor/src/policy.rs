use crate::retry::RetryPolicy;

/// Wire-level hint forwarded to the remote; the executor does not
/// interpret it beyond passing it through (spec §4.4 "Flags & semantics").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassPlugins {
    None,
    Sync,
    Async,
    All,
}

#[derive(Debug, Clone)]
pub struct ExecutionPolicy {
    pub batch_size: usize,
    pub bypass_plugins: BypassPlugins,
    pub bypass_flows: bool,
    /// If false, the executor cancels in-flight batches on the first
    /// permanent failure and returns (spec §4.4, §4.7).
    pub continue_on_error: bool,
    pub retry: RetryPolicy,
    /// Upper bound on concurrently in-flight batches, independent of the
    /// pool's own throttle-adjusted DOP — the smaller of the two wins.
    pub requested_dop: usize,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            batch_size: model::batch::DEFAULT_BATCH_SIZE,
            bypass_plugins: BypassPlugins::None,
            bypass_flows: false,
            continue_on_error: true,
            retry: RetryPolicy::default(),
            requested_dop: 8,
        }
    }
}
