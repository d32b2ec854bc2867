// Repeating timer - Drives the scheduler poll
//
// The scheduler never re-arms itself; the host supplies a timer that calls
// the tick closure every period until cancelled:
// - `ThreadTimer`: dedicated poll thread, the default for real playback
// - `ManualTimer`: ticks only when `fire()` is called (host event loops, tests)

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Work run on every tick
pub type TickFn = Box<dyn FnMut() + Send + 'static>;

pub trait RepeatingTimer {
    /// Call `tick` every `period` until `cancel`. Replaces any running tick.
    fn start(&mut self, period: Duration, tick: TickFn);

    /// Stop ticking. No tick starts after this returns.
    fn cancel(&mut self);

    fn is_active(&self) -> bool;
}

struct PollThread {
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Timer backed by a named thread that sleeps between ticks
///
/// Ticks are spaced from a fixed deadline grid; a late tick does not push
/// the following ones back. The scheduler tolerates the sleep jitter.
#[derive(Default)]
pub struct ThreadTimer {
    thread: Option<PollThread>,
}

impl ThreadTimer {
    pub fn new() -> Self {
        Self { thread: None }
    }
}

impl RepeatingTimer for ThreadTimer {
    fn start(&mut self, period: Duration, mut tick: TickFn) {
        self.cancel();

        let active = Arc::new(AtomicBool::new(true));
        let thread_active = Arc::clone(&active);

        let spawned = thread::Builder::new()
            .name("metronome-poll".into())
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                while thread_active.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < deadline {
                        // Woken early by cancel() or spuriously: re-check
                        thread::park_timeout(deadline - now);
                        continue;
                    }

                    tick();

                    deadline += period;
                    let now = Instant::now();
                    if deadline < now {
                        deadline = now + period;
                    }
                }
            });

        match spawned {
            Ok(handle) => self.thread = Some(PollThread { active, handle }),
            Err(e) => log::error!("Failed to spawn scheduler poll thread: {}", e),
        }
    }

    fn cancel(&mut self) {
        if let Some(poll) = self.thread.take() {
            poll.active.store(false, Ordering::Release);
            poll.handle.thread().unpark();
            // Joining from inside a tick would wait on ourselves
            if poll.handle.thread().id() != thread::current().id() && poll.handle.join().is_err()
            {
                log::warn!("Scheduler poll thread panicked");
            }
        }
    }

    fn is_active(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|poll| poll.active.load(Ordering::Acquire))
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Default)]
struct ManualState {
    tick: Option<TickFn>,
    period: Duration,
    generation: u64,
    fired: u64,
}

/// Timer that only ticks when told to
///
/// Clones share state, so a host can keep a handle after moving the timer
/// into a `Transport`.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick. Returns false when the timer is not active.
    pub fn fire(&self) -> bool {
        let (tick, generation) = {
            let mut state = self.state.lock();
            (state.tick.take(), state.generation)
        };

        let Some(mut tick) = tick else {
            return false;
        };

        // Run unlocked so the tick may cancel or restart this timer
        tick();

        let mut state = self.state.lock();
        state.fired += 1;
        if state.generation == generation && state.tick.is_none() {
            state.tick = Some(tick);
        }
        true
    }

    /// Ticks run so far
    pub fn fired(&self) -> u64 {
        self.state.lock().fired
    }

    /// Period requested by the last `start`
    pub fn period(&self) -> Duration {
        self.state.lock().period
    }
}

impl RepeatingTimer for ManualTimer {
    fn start(&mut self, period: Duration, tick: TickFn) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.period = period;
        state.tick = Some(tick);
    }

    fn cancel(&mut self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.tick = None;
    }

    fn is_active(&self) -> bool {
        let state = self.state.lock();
        state.tick.is_some()
    }
}
