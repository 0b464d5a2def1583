//! TTI-tick-driven timers.
//!
//! Each timer tracks an expiry tick rather than a wall-clock deadline: the MAC thread calls
//! `on_tick(current_tti)` once per TTI (1ms) and every timer belonging to the entity is checked
//! inline, following the cooperative-within-a-thread model of spec §9 (no dedicated timer
//! thread). Grounded on the teacher's single polling loop (`lib.rs::segment_loop`) driving
//! `TCB::on_tick` for every connection each iteration, generalized here to per-timer state.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Running { expiry_tti: u64 },
}

/// One tick-driven timer. `has_expired` is sticky until explicitly `stop`ped or restarted, so a
/// caller can `check()` once per tick and still observe a firing it missed by a tick or two.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    state: State,
    fired: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Timer {
            state: State::Stopped,
            fired: false,
        }
    }
}

impl Timer {
    pub fn new() -> Self {
        Timer::default()
    }

    pub fn start(&mut self, now_tti: u64, duration_ms: u32) {
        self.state = State::Running {
            expiry_tti: now_tti + duration_ms as u64,
        };
        self.fired = false;
    }

    pub fn stop(&mut self) {
        self.state = State::Stopped;
        self.fired = false;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Advance the timer to `now_tti`, latching `fired` if expiry has passed. Idempotent: calling
    /// this multiple times for the same or an earlier tick does not re-fire.
    pub fn check(&mut self, now_tti: u64) {
        if let State::Running { expiry_tti } = self.state {
            if now_tti >= expiry_tti {
                self.fired = true;
            }
        }
    }

    /// Whether the timer has expired since it was last started. Does not clear the flag; callers
    /// that act on expiry and want to arm a fresh cycle must call `start` again.
    pub fn has_expired(&self) -> bool {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_duration() {
        let mut t = Timer::new();
        t.start(0, 10);
        assert!(t.is_running());
        t.check(9);
        assert!(!t.has_expired());
        t.check(10);
        assert!(t.has_expired());
    }

    #[test]
    fn stop_clears_expiry() {
        let mut t = Timer::new();
        t.start(0, 5);
        t.check(5);
        assert!(t.has_expired());
        t.stop();
        assert!(!t.is_running());
        assert!(!t.has_expired());
    }

    #[test]
    fn restart_rearms() {
        let mut t = Timer::new();
        t.start(0, 5);
        t.check(5);
        assert!(t.has_expired());
        t.start(5, 5);
        assert!(!t.has_expired());
        t.check(9);
        assert!(!t.has_expired());
        t.check(10);
        assert!(t.has_expired());
    }
}
