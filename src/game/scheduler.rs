//! Per-entity timer scheduler
//!
//! Each entity owns its own scheduler and identifies timers by a key type.
//! A key names at most one timer: arming a key that is already armed
//! replaces it, so a repeating timer can never be duplicated.

/// Slack absorbed when comparing accumulated float time against a deadline
const DEADLINE_EPSILON: f32 = 1e-4;

/// Shortest interval a repeating timer may use
const MIN_INTERVAL: f32 = 1e-3;

#[derive(Debug, Clone)]
struct Timer<K> {
    key: K,
    interval: f32,
    remaining: f32,
    repeating: bool,
    paused: bool,
}

/// Simulated-time scheduler owned by a single entity
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    timers: Vec<Timer<K>>,
}

impl<K: Copy + Eq> Scheduler<K> {
    pub fn new() -> Self {
        Self { timers: Vec::new() }
    }

    /// Arm (or re-arm) the timer for `key`. Re-arming resets its countdown and unpauses it.
    pub fn set_timer(&mut self, key: K, interval: f32, repeating: bool) {
        let interval = if repeating {
            interval.max(MIN_INTERVAL)
        } else {
            interval.max(0.0)
        };

        let timer = Timer {
            key,
            interval,
            remaining: interval,
            repeating,
            paused: false,
        };

        match self.timers.iter_mut().find(|t| t.key == key) {
            Some(existing) => *existing = timer,
            None => self.timers.push(timer),
        }
    }

    /// Freeze the countdown of `key`. Only re-arming it with `set_timer` resumes it.
    pub fn pause(&mut self, key: K) {
        if let Some(timer) = self.timers.iter_mut().find(|t| t.key == key) {
            timer.paused = true;
        }
    }

    pub fn cancel(&mut self, key: K) {
        self.timers.retain(|t| t.key != key);
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    /// Armed and counting down
    pub fn is_active(&self, key: K) -> bool {
        self.timers.iter().any(|t| t.key == key && !t.paused)
    }

    /// Armed, paused or not
    pub fn is_armed(&self, key: K) -> bool {
        self.timers.iter().any(|t| t.key == key)
    }

    pub fn is_paused(&self, key: K) -> bool {
        self.timers.iter().any(|t| t.key == key && t.paused)
    }

    /// Seconds until `key` next fires
    pub fn remaining(&self, key: K) -> Option<f32> {
        self.timers
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.remaining.max(0.0))
    }

    /// Number of timers currently armed
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Advance simulated time by `dt` seconds and return every expiry in the
    /// order it happened. A repeating timer may appear several times when `dt`
    /// spans more than one interval. One-shot timers are removed once fired.
    pub fn advance(&mut self, dt: f32) -> Vec<K> {
        let mut fired: Vec<(f32, K)> = Vec::new();

        for timer in self.timers.iter_mut().filter(|t| !t.paused) {
            let mut elapsed_at_fire = timer.remaining;
            timer.remaining -= dt;

            while timer.remaining <= DEADLINE_EPSILON {
                fired.push((elapsed_at_fire, timer.key));
                if !timer.repeating {
                    break;
                }
                timer.remaining += timer.interval;
                elapsed_at_fire += timer.interval;
            }
        }

        self.timers
            .retain(|t| t.repeating || t.paused || t.remaining > DEADLINE_EPSILON);

        fired.sort_by(|a, b| a.0.total_cmp(&b.0));
        fired.into_iter().map(|(_, key)| key).collect()
    }
}

impl<K: Copy + Eq> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Key {
        Tick,
        Once,
    }

    #[test]
    fn repeating_timer_fires_on_cadence() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timer(Key::Tick, 0.1, true);

        let dt = 1.0 / 30.0;
        let mut fired = 0;
        for _ in 0..30 {
            fired += scheduler.advance(dt).len();
        }
        assert_eq!(fired, 10);
    }

    #[test]
    fn one_shot_fires_once_and_disarms() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timer(Key::Once, 1.0, false);

        assert!(scheduler.advance(0.5).is_empty());
        assert_eq!(scheduler.advance(0.5), vec![Key::Once]);
        assert!(!scheduler.is_armed(Key::Once));
        assert!(scheduler.advance(5.0).is_empty());
    }

    #[test]
    fn re_arming_replaces_instead_of_duplicating() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timer(Key::Tick, 0.25, true);
        scheduler.set_timer(Key::Tick, 0.25, true);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.advance(0.25), vec![Key::Tick]);
    }

    #[test]
    fn paused_timer_stays_silent_until_re_armed() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timer(Key::Tick, 0.1, true);
        scheduler.pause(Key::Tick);

        assert!(scheduler.advance(1.0).is_empty());
        assert!(scheduler.is_paused(Key::Tick));

        scheduler.set_timer(Key::Tick, 0.1, true);
        assert_eq!(scheduler.advance(0.1), vec![Key::Tick]);
    }

    #[test]
    fn expiries_are_reported_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timer(Key::Once, 0.3, false);
        scheduler.set_timer(Key::Tick, 0.2, true);

        assert_eq!(
            scheduler.advance(0.45),
            vec![Key::Tick, Key::Once, Key::Tick]
        );
    }
}
