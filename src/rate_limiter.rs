use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct State {
    window_start: Instant,
    request_count: u32,
    blocked_until: Option<Instant>,
}

/// Caps the number of calls made to the ECB per minute. Going over the
/// cap blocks every call for `block_duration`.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_minute: u32,
    block_duration: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32, block_duration: Duration) -> Self {
        Self {
            max_per_minute,
            block_duration,
            state: Mutex::new(State {
                window_start: Instant::now(),
                request_count: 0,
                blocked_until: None,
            }),
        }
    }

    pub fn is_blocked(&self) -> bool {
        let state = self.lock();
        matches!(state.blocked_until, Some(until) if Instant::now() < until)
    }

    /// Records an outgoing call. Returns false when the call must not be made.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut state = self.lock();

        if let Some(until) = state.blocked_until {
            if now < until {
                return false;
            }
            state.blocked_until = None;
        }

        if now.duration_since(state.window_start) > WINDOW {
            state.window_start = now;
            state.request_count = 0;
        }

        state.request_count += 1;
        if state.request_count > self.max_per_minute {
            state.blocked_until = Some(now + self.block_duration);
            log::warn!(
                "ECB request rate exceeded ({}/min), blocking calls for {:?}",
                self.max_per_minute,
                self.block_duration
            );
            return false;
        }

        true
    }

    /// Blocks calls after the upstream itself reported throttling.
    pub fn block(&self) {
        let mut state = self.lock();
        state.blocked_until = Some(Instant::now() + self.block_duration);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
