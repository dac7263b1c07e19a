//! Manually ticked interval timers used for animated materials.

/// Identifies a registered interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntervalId(u64);

struct Interval<T> {
    id: IntervalId,
    delay_ms: f64,
    elapsed_ms: f64,
    payload: T,
}

/// Repeating timers advanced by [`Scheduler::tick`].
///
/// Each interval carries a payload handed to the tick callback whenever it
/// fires. A tick longer than the delay fires the interval several times.
pub struct Scheduler<T> {
    intervals: Vec<Interval<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            intervals: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a timer firing every `delay_ms` milliseconds.
    ///
    /// Non-positive delays are raised to 1 ms.
    pub fn interval(&mut self, delay_ms: f64, payload: T) -> IntervalId {
        let id = IntervalId(self.next_id);
        self.next_id += 1;
        self.intervals.push(Interval {
            id,
            delay_ms: if delay_ms > 0.0 { delay_ms } else { 1.0 },
            elapsed_ms: 0.0,
            payload,
        });
        id
    }

    /// Removes a timer. Returns its payload if it was registered.
    pub fn cancel(&mut self, id: IntervalId) -> Option<T> {
        let pos = self.intervals.iter().position(|i| i.id == id)?;
        Some(self.intervals.remove(pos).payload)
    }

    /// Advances every timer by `dt_ms`, calling `fire` once per elapsed period.
    pub fn tick(&mut self, dt_ms: f64, mut fire: impl FnMut(IntervalId, &mut T)) {
        for interval in &mut self.intervals {
            interval.elapsed_ms += dt_ms;
            while interval.elapsed_ms >= interval.delay_ms {
                interval.elapsed_ms -= interval.delay_ms;
                fire(interval.id, &mut interval.payload);
            }
        }
    }

    /// Number of registered timers.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_per_period() {
        let mut scheduler = Scheduler::new();
        scheduler.interval(250.0, 0u32);

        let mut fired = 0;
        scheduler.tick(100.0, |_, n| {
            *n += 1;
            fired += 1;
        });
        assert_eq!(fired, 0);

        scheduler.tick(150.0, |_, _| fired += 1);
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_long_tick_fires_repeatedly() {
        let mut scheduler = Scheduler::new();
        scheduler.interval(100.0, ());
        let mut fired = 0;
        scheduler.tick(350.0, |_, _| fired += 1);
        assert_eq!(fired, 3);
        scheduler.tick(50.0, |_, _| fired += 1);
        assert_eq!(fired, 4);
    }

    #[test]
    fn test_intervals_are_independent() {
        let mut scheduler = Scheduler::new();
        let fast = scheduler.interval(100.0, "fast");
        let slow = scheduler.interval(1000.0, "slow");

        let mut log = Vec::new();
        scheduler.tick(200.0, |id, name| log.push((id, *name)));
        assert_eq!(log, vec![(fast, "fast"), (fast, "fast")]);

        log.clear();
        scheduler.tick(800.0, |id, _| log.push((id, "")));
        assert!(log.iter().any(|(id, _)| *id == slow));
    }

    #[test]
    fn test_cancel_stops_firing() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.interval(10.0, 5);
        assert_eq!(scheduler.cancel(id), Some(5));
        assert!(scheduler.is_empty());

        let mut fired = false;
        scheduler.tick(100.0, |_, _| fired = true);
        assert!(!fired);
        assert_eq!(scheduler.cancel(id), None);
    }
}
