//! Rate limiting for the opportunistic expired-key sweep.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Token bucket gating full-namespace sweeps.
///
/// Refills to capacity once per interval. `try_acquire` never blocks; the
/// sweep itself runs inline on the caller's thread when a token is granted,
/// never on a timer thread.
#[derive(Debug)]
pub struct SweepGate {
    capacity: u32,
    interval: Duration,
    state: Mutex<GateState>,
}

#[derive(Debug)]
struct GateState {
    tokens: u32,
    refilled_at: Instant,
}

impl SweepGate {
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self {
            capacity,
            interval,
            state: Mutex::new(GateState {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        if now.duration_since(state.refilled_at) >= self.interval {
            state.tokens = self.capacity;
            state.refilled_at = now;
        }
        if state.tokens == 0 {
            return false;
        }
        state.tokens -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drains_and_refills() {
        let gate = SweepGate::new(2, Duration::from_millis(40));
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());

        thread::sleep(Duration::from_millis(60));
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }
}
