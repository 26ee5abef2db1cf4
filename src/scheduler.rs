//! Time-based triggers driven by frame time.
//!
//! Nothing here sleeps. The owner calls [`Scheduler::advance`] once per frame
//! with the elapsed `dt` and handles whatever came due. The scheduler itself
//! does no gating: a tick fires whether or not anyone is ready for it.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fired<T> {
    Tick,
    Timeout(T),
}

#[derive(Debug)]
struct Periodic {
    interval: Duration,
    next_due: Duration,
}

#[derive(Debug)]
struct OneShot<T> {
    id: TimerId,
    due: Duration,
    payload: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    periodic: Option<Periodic>,
    timers: Vec<OneShot<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            periodic: None,
            timers: Vec::new(),
            next_id: 0,
        }
    }

    /// Starts (or restarts) the periodic tick; the first one is due one full
    /// `interval` from now.
    pub fn on_tick(&mut self, interval: Duration) {
        self.periodic = Some(Periodic {
            interval,
            next_due: self.now + interval,
        });
    }

    pub fn stop_tick(&mut self) {
        self.periodic = None;
    }

    /// Registers a one-shot timer that fires `delay` from now.
    pub fn after(&mut self, delay: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(OneShot {
            id,
            due: self.now + delay,
            payload,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let pos = self.timers.iter().position(|timer| timer.id == id)?;
        Some(self.timers.remove(pos).payload)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Moves the clock forward by `dt` and returns everything that came due,
    /// earliest first. A periodic tick that missed several intervals fires
    /// once and is rescheduled from the current time.
    pub fn advance(&mut self, dt: Duration) -> Vec<Fired<T>> {
        self.now += dt;
        let now = self.now;

        let mut due: Vec<(Duration, u64, Fired<T>)> = Vec::new();

        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].due <= now {
                let timer = self.timers.remove(i);
                due.push((timer.due, timer.id.0, Fired::Timeout(timer.payload)));
            } else {
                i += 1;
            }
        }

        if let Some(periodic) = self.periodic.as_mut() {
            if periodic.next_due <= now {
                let fired_at = periodic.next_due;
                periodic.next_due = if now - fired_at >= periodic.interval {
                    now + periodic.interval
                } else {
                    fired_at + periodic.interval
                };
                // Ties go to one-shot timers.
                due.push((fired_at, u64::MAX, Fired::Tick));
            }
        }

        due.sort_by_key(|(at, order, _)| (*at, *order));
        due.into_iter().map(|(_, _, fired)| fired).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn periodic_tick_fires_each_interval() {
        let mut s: Scheduler<()> = Scheduler::new();
        s.on_tick(ms(3000));
        assert!(s.advance(ms(2999)).is_empty());
        assert_eq!(s.advance(ms(1)), vec![Fired::Tick]);
        assert!(s.advance(ms(1500)).is_empty());
        assert_eq!(s.advance(ms(1500)), vec![Fired::Tick]);
    }

    #[test]
    fn missed_ticks_collapse_into_one() {
        let mut s: Scheduler<()> = Scheduler::new();
        s.on_tick(ms(100));
        assert_eq!(s.advance(ms(1000)), vec![Fired::Tick]);
        assert!(s.advance(ms(99)).is_empty());
        assert_eq!(s.advance(ms(1)), vec![Fired::Tick]);
    }

    #[test]
    fn one_shot_fires_once() {
        let mut s = Scheduler::new();
        s.after(ms(1500), "reveal");
        assert!(s.advance(ms(1499)).is_empty());
        assert_eq!(s.advance(ms(1)), vec![Fired::Timeout("reveal")]);
        assert!(s.advance(ms(5000)).is_empty());
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut s = Scheduler::new();
        let id = s.after(ms(10), 1);
        assert_eq!(s.cancel(id), Some(1));
        assert!(s.advance(ms(20)).is_empty());
    }

    #[test]
    fn events_come_out_in_due_order() {
        let mut s = Scheduler::new();
        s.on_tick(ms(50));
        s.after(ms(80), "late");
        s.after(ms(20), "early");
        s.after(ms(50), "tied");
        assert_eq!(
            s.advance(ms(100)),
            vec![
                Fired::Timeout("early"),
                Fired::Timeout("tied"),
                Fired::Tick,
                Fired::Timeout("late"),
            ]
        );
    }

    #[test]
    fn stopped_tick_leaves_timers_running() {
        let mut s = Scheduler::new();
        s.on_tick(ms(10));
        s.after(ms(30), "reveal");
        s.stop_tick();
        assert_eq!(s.advance(ms(30)), vec![Fired::Timeout("reveal")]);
        assert!(s.advance(ms(100)).is_empty());
    }
}
