use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::io;
use std::thread;
use std::time::Instant;

use super::scheduler::TickPlan;

/// A running periodic timer thread. Dropping the handle cancels it: the
/// cancel channel disconnects and the thread returns at its next wait.
///
/// Deadlines advance by whole periods from the plan's first deadline, so
/// neither a late spawn nor late wake-ups shift the grid.
#[derive(Debug)]
pub(crate) struct TickSource {
    generation: u64,
    _cancel: Sender<()>,
}

impl TickSource {
    /// Spawn a timer thread. `on_tick` receives the generation it was armed
    /// with and returns `false` to end the thread.
    pub(crate) fn spawn<F>(generation: u64, plan: TickPlan, mut on_tick: F) -> io::Result<Self>
    where
        F: FnMut(u64) -> bool + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = channel::bounded::<()>(1);

        thread::Builder::new()
            .name(format!("cuebeat-tick-{generation}"))
            .spawn(move || {
                let mut deadline = plan.first_deadline;
                loop {
                    match cancel_rx.recv_deadline(deadline) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    }

                    if !on_tick(generation) {
                        return;
                    }

                    deadline += plan.period;
                    let now = Instant::now();
                    if deadline < now && !plan.period.is_zero() {
                        // Stalled for more than a period: skip the missed
                        // beats instead of firing them back to back.
                        let behind = now - deadline;
                        let missed = behind.as_nanos() / plan.period.as_nanos() + 1;
                        deadline += plan.period * missed as u32;
                    }
                }
            })?;

        Ok(Self {
            generation,
            _cancel: cancel_tx,
        })
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn plan(ms: u64) -> TickPlan {
        let period = Duration::from_millis(ms);
        TickPlan {
            first_deadline: Instant::now() + period,
            period,
        }
    }

    #[test]
    fn test_ticks_until_dropped() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let source = TickSource::spawn(7, plan(20), move |generation| {
            assert_eq!(generation, 7);
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();
        assert_eq!(source.generation(), 7);

        thread::sleep(Duration::from_millis(110));
        drop(source);
        let at_cancel = count.load(Ordering::SeqCst);
        assert!(at_cancel >= 2, "only {at_cancel} ticks");

        thread::sleep(Duration::from_millis(80));
        // At most one tick that was already past its wait can land.
        assert!(count.load(Ordering::SeqCst) <= at_cancel + 1);
    }

    #[test]
    fn test_callback_can_end_thread() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let _source = TickSource::spawn(1, plan(10), move |_| {
            counter.fetch_add(1, Ordering::SeqCst) < 2
        })
        .unwrap();

        thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_late_spawn_keeps_grid() {
        let anchor = Instant::now();
        let period = Duration::from_millis(100);
        let plan = TickPlan {
            first_deadline: anchor + period,
            period,
        };
        thread::sleep(Duration::from_millis(60));

        let times = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&times);
        let source = TickSource::spawn(1, plan, move |_| {
            recorded.lock().unwrap().push(Instant::now());
            true
        })
        .unwrap();

        thread::sleep(Duration::from_millis(350));
        drop(source);

        let times = times.lock().unwrap();
        assert!(times.len() >= 2, "only {} ticks", times.len());
        for (i, at) in times.iter().enumerate() {
            assert!(*at >= anchor + period * (i as u32 + 1), "tick {i} early");
        }
        // Anchored to the plan, not to the spawn 60 ms later.
        assert!(times[0] < anchor + Duration::from_millis(160));
    }

    #[test]
    fn test_stall_skips_missed_beats() {
        let anchor = Instant::now();
        let period = Duration::from_millis(20);
        let plan = TickPlan {
            first_deadline: anchor + period,
            period,
        };

        let times = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&times);
        let source = TickSource::spawn(1, plan, move |_| {
            let mut times = recorded.lock().unwrap();
            times.push(Instant::now());
            if times.len() == 1 {
                // Block for three and a half periods.
                thread::sleep(Duration::from_millis(70));
            }
            true
        })
        .unwrap();

        thread::sleep(Duration::from_millis(250));
        drop(source);

        let times = times.lock().unwrap();
        assert!(times.len() >= 2, "only {} ticks", times.len());
        // The stall ends at least 90 ms in; the next tick waits for the
        // following grid point instead of catching up.
        assert!(times[1] >= anchor + Duration::from_millis(100));
    }
}
