//! Single-slot retransmission timer.
//!
//! The timer does not sleep on its own. `arm` hands back a [`TimerHandle`]
//! that the engine schedules on its event queue; when the expiry is popped
//! the engine asks [`TimerService::is_live`] whether the handle still owns
//! the slot. Cancelling or re-arming bumps the slot generation, so older
//! expiries become inert.

use arq_lab_abstract::TxId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    generation: u64,
    pub tx_id: TxId,
    pub fires_at: u64,
}

#[derive(Debug, Default)]
pub struct TimerService {
    generation: u64,
    armed: Option<TimerHandle>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the slot for `tx_id`, implicitly cancelling whatever was armed before.
    pub fn arm(&mut self, now: u64, delay_ms: u64, tx_id: TxId) -> TimerHandle {
        self.generation += 1;
        let handle = TimerHandle {
            generation: self.generation,
            tx_id,
            fires_at: now.saturating_add(delay_ms),
        };
        self.armed = Some(handle);
        handle
    }

    /// No-op when `handle` no longer owns the slot.
    pub fn cancel(&mut self, handle: TimerHandle) {
        if self.armed == Some(handle) {
            self.cancel_all();
        }
    }

    pub fn cancel_all(&mut self) {
        self.generation += 1;
        self.armed = None;
    }

    pub fn is_live(&self, handle: &TimerHandle) -> bool {
        self.armed.as_ref() == Some(handle)
    }

    /// Consumes a live handle whose deadline was reached. Returns false if it was stale.
    pub fn expire(&mut self, handle: &TimerHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        self.armed = None;
        true
    }

    pub fn armed(&self) -> Option<TimerHandle> {
        self.armed
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_supersedes_previous_handle() {
        let mut timer = TimerService::new();
        let first = timer.arm(0, 100, TxId(1));
        let second = timer.arm(50, 100, TxId(2));

        assert!(!timer.is_live(&first));
        assert!(timer.is_live(&second));
        assert_eq!(second.fires_at, 150);
    }

    #[test]
    fn cancelled_handle_never_expires() {
        let mut timer = TimerService::new();
        let handle = timer.arm(0, 100, TxId(1));
        timer.cancel(handle);
        assert!(!timer.is_armed());
        assert!(!timer.expire(&handle));
    }

    #[test]
    fn cancelling_stale_handle_keeps_current_one() {
        let mut timer = TimerService::new();
        let stale = timer.arm(0, 100, TxId(1));
        let current = timer.arm(10, 100, TxId(2));
        timer.cancel(stale);
        assert!(timer.is_live(&current));
    }

    #[test]
    fn deadline_saturates_at_end_of_time() {
        let mut timer = TimerService::new();
        let handle = timer.arm(u64::MAX - 10, 100, TxId(1));
        assert_eq!(handle.fires_at, u64::MAX);
    }

    #[test]
    fn expiry_consumes_the_slot() {
        let mut timer = TimerService::new();
        let handle = timer.arm(0, 100, TxId(3));
        assert!(timer.expire(&handle));
        assert!(!timer.expire(&handle));
        assert_eq!(timer.armed(), None);
    }
}
