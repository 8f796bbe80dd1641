//! Single-threaded timer queue with an injectable clock.
//!
//! Nothing fires on its own: the owner calls [`TimerQueue::run_due`] from its
//! loop, and tests drive a [`ManualClock`] forward instead of sleeping.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    deadline: Duration,
    task: Box<dyn FnOnce()>,
}

pub struct TimerQueue {
    clock: Box<dyn Clock>,
    next_id: Cell<u64>,
    timers: RefCell<Vec<Timer>>,
}

impl TimerQueue {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            next_id: Cell::new(0),
            timers: RefCell::new(Vec::new()),
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.timers.borrow_mut().push(Timer {
            id,
            deadline: self.clock.now() + delay,
            task: Box::new(task),
        });
        id
    }

    /// Drop a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        timers.len() != before
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.borrow().iter().any(|t| t.id == id)
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Run every timer whose deadline has passed, earliest first.
    /// Tasks may schedule or cancel timers. Returns how many ran.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.clock.now();
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= now)
                    .min_by_key(|(_, t)| (t.deadline, t.id.0))
                    .map(|(idx, _)| idx);
                due.map(|idx| timers.remove(idx))
            };
            match next {
                Some(timer) => {
                    (timer.task)();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}
