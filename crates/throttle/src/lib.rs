//! Process-wide tracking of remote rate-limit signals, advising callers
//! whether to admit new work or defer it. Per-endpoint sliding windows
//! over recent outcomes plus a linear-recovery backoff.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex, RwLock,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tracing::debug;

/// Last N responses kept per endpoint for the 429-ratio calculation.
const WINDOW_SIZE: usize = 128;
/// Ratio window: only responses within this many seconds of "now" count
/// toward the 429-ratio decision.
const RATIO_WINDOW: Duration = Duration::from_secs(10);
/// 429-ratio above which the tracker enters `defer`.
const THROTTLE_RATIO_THRESHOLD: f64 = 0.10;
/// Backoff ceiling.
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Fallback initial backoff when the remote gave no `Retry-After`.
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Consecutive successes required to grow the DOP cap by one.
const DOP_RECOVERY_STEP: u64 = 200;

/// Whether the caller should proceed now or wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottlePolicy {
    Admit,
    Defer(Duration),
}

struct Outcome {
    at: Instant,
    throttled: bool,
}

struct EndpointState {
    window: Mutex<VecDeque<Outcome>>,
    /// Zero means "not currently backing off".
    current_backoff_ms: AtomicU64,
    defer_started: Mutex<Option<Instant>>,
    /// Negative means "uninitialized"; otherwise the current DOP cap.
    dop_cap: AtomicI64,
    consecutive_successes: AtomicU64,
}

impl EndpointState {
    fn new() -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(WINDOW_SIZE)),
            current_backoff_ms: AtomicU64::new(0),
            defer_started: Mutex::new(None),
            dop_cap: AtomicI64::new(-1),
            consecutive_successes: AtomicU64::new(0),
        }
    }
}

/// Process-wide, thread-safe advisor. Cheap to clone (internally an `Arc`
/// would be typical, but callers are expected to hold one instance behind
/// their own `Arc`, as `pool` does).
pub struct ThrottleTracker {
    endpoints: RwLock<HashMap<String, EndpointState>>,
}

impl Default for ThrottleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottleTracker {
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    fn with_endpoint<R>(&self, endpoint: &str, f: impl FnOnce(&EndpointState) -> R) -> R {
        {
            let read = self.endpoints.read().expect("throttle state poisoned");
            if let Some(state) = read.get(endpoint) {
                return f(state);
            }
        }
        let mut write = self.endpoints.write().expect("throttle state poisoned");
        let state = write
            .entry(endpoint.to_string())
            .or_insert_with(EndpointState::new);
        f(state)
    }

    /// Record one request outcome.
    pub fn on_response(
        &self,
        endpoint: &str,
        _latency_ms: u64,
        throttled: bool,
        retry_after: Option<Duration>,
    ) {
        self.with_endpoint(endpoint, |state| {
            {
                let mut window = state.window.lock().expect("throttle window poisoned");
                window.push_back(Outcome {
                    at: Instant::now(),
                    throttled,
                });
                while window.len() > WINDOW_SIZE {
                    window.pop_front();
                }
            }

            if throttled {
                self.enter_or_extend_backoff(state, retry_after);
                state.consecutive_successes.store(0, Ordering::Relaxed);
                let cap = state.dop_cap.load(Ordering::Relaxed);
                if cap > 1 {
                    state.dop_cap.fetch_sub(1, Ordering::Relaxed);
                } else if cap < 0 {
                    // Uninitialized cap with an immediate throttle: nothing to
                    // shrink yet; EffectiveDop will seed it on first call.
                }
            } else {
                self.recover_backoff(state);
                let successes = state.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
                if successes % DOP_RECOVERY_STEP == 0 {
                    state.dop_cap.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }

    fn enter_or_extend_backoff(&self, state: &EndpointState, retry_after: Option<Duration>) {
        let current = state.current_backoff_ms.load(Ordering::Relaxed);
        let next = if current == 0 {
            retry_after.unwrap_or(DEFAULT_INITIAL_BACKOFF)
        } else {
            Duration::from_millis(current).saturating_mul(2).min(MAX_BACKOFF)
        };
        state
            .current_backoff_ms
            .store(next.as_millis() as u64, Ordering::Relaxed);
        *state.defer_started.lock().expect("poisoned") = Some(Instant::now());
        debug!(endpoint_backoff_ms = next.as_millis() as u64, "throttle backoff extended");
    }

    fn recover_backoff(&self, state: &EndpointState) {
        let current = state.current_backoff_ms.load(Ordering::Relaxed);
        if current == 0 {
            return;
        }
        // Linear recovery: each clean response shaves a fixed fraction off.
        let decrement = (MAX_BACKOFF.as_millis() as u64 / 10).max(100);
        let next = current.saturating_sub(decrement);
        state.current_backoff_ms.store(next, Ordering::Relaxed);
        if next == 0 {
            *state.defer_started.lock().expect("poisoned") = None;
        }
    }

    /// Tells the pool whether to hand out a client now or sleep.
    pub fn current_policy(&self, endpoint: &str) -> ThrottlePolicy {
        self.with_endpoint(endpoint, |state| {
            let backoff_ms = state.current_backoff_ms.load(Ordering::Relaxed);
            if backoff_ms == 0 {
                return ThrottlePolicy::Admit;
            }

            let ratio = self.throttle_ratio(state);
            if ratio <= THROTTLE_RATIO_THRESHOLD {
                return ThrottlePolicy::Admit;
            }

            let started = state.defer_started.lock().expect("poisoned");
            let elapsed = started.map(|s| s.elapsed()).unwrap_or_default();
            let backoff = Duration::from_millis(backoff_ms);
            if elapsed >= backoff {
                ThrottlePolicy::Admit
            } else {
                ThrottlePolicy::Defer(backoff - elapsed)
            }
        })
    }

    fn throttle_ratio(&self, state: &EndpointState) -> f64 {
        let window = state.window.lock().expect("throttle window poisoned");
        let now = Instant::now();
        let recent: Vec<&Outcome> = window
            .iter()
            .filter(|o| now.duration_since(o.at) <= RATIO_WINDOW)
            .collect();
        if recent.is_empty() {
            return 0.0;
        }
        let throttled = recent.iter().filter(|o| o.throttled).count();
        throttled as f64 / recent.len() as f64
    }

    /// `min(requestedDop, currentDopCap)`, clamped to `[1, requestedDop]`.
    pub fn effective_dop(&self, endpoint: &str, requested_dop: usize) -> usize {
        let requested_dop = requested_dop.max(1);
        self.with_endpoint(endpoint, |state| {
            let cap = state.dop_cap.load(Ordering::Relaxed);
            if cap < 0 {
                state
                    .dop_cap
                    .store(requested_dop as i64, Ordering::Relaxed);
                return requested_dop;
            }
            (cap as usize).clamp(1, requested_dop)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_by_default() {
        let tracker = ThrottleTracker::new();
        assert_eq!(tracker.current_policy("env1"), ThrottlePolicy::Admit);
    }

    #[test]
    fn throttled_responses_trigger_defer() {
        let tracker = ThrottleTracker::new();
        for _ in 0..20 {
            tracker.on_response("env1", 10, true, Some(Duration::from_millis(50)));
        }
        assert!(matches!(
            tracker.current_policy("env1"),
            ThrottlePolicy::Defer(_)
        ));
    }

    #[test]
    fn effective_dop_drops_on_429_and_recovers_on_successes() {
        let tracker = ThrottleTracker::new();
        assert_eq!(tracker.effective_dop("env1", 10), 10);
        tracker.on_response("env1", 10, true, Some(Duration::from_millis(10)));
        assert_eq!(tracker.effective_dop("env1", 10), 9);

        for _ in 0..DOP_RECOVERY_STEP {
            tracker.on_response("env1", 10, false, None);
        }
        assert_eq!(tracker.effective_dop("env1", 10), 10);
    }

    #[test]
    fn dop_cap_never_exceeds_requested() {
        let tracker = ThrottleTracker::new();
        for _ in 0..(DOP_RECOVERY_STEP * 3) {
            tracker.on_response("env1", 10, false, None);
        }
        assert_eq!(tracker.effective_dop("env1", 5), 5);
    }

    #[test]
    fn backoff_recovers_linearly_after_successes() {
        let tracker = ThrottleTracker::new();
        tracker.on_response("env1", 10, true, Some(Duration::from_millis(600)));
        assert!(matches!(
            tracker.current_policy("env1"),
            ThrottlePolicy::Defer(_)
        ));
        for _ in 0..20 {
            tracker.on_response("env1", 10, false, None);
        }
        assert_eq!(tracker.current_policy("env1"), ThrottlePolicy::Admit);
    }
}
