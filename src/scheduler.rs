/// Deterministic timer queue over a virtual clock.
///
/// The engine is single-threaded and run-to-completion; "time" only moves
/// when the embedder calls `Engine::advance`, which drains due entries in
/// `(due, arming order)` order. Interval entries re-arm themselves under the
/// same handle, so a handle stays valid for the whole life of a periodic
/// timer.

/// Cancellation token of an armed timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// What to do when a timer fires; interpreted by the action registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TimerTask {
    /// Synthetic timer trigger of a registered action.
    Action { id: String },
    /// Deferred execution of a throttled action.
    Throttle { id: String },
}

#[derive(Clone, Debug)]
pub(crate) struct DueTimer {
    pub(crate) task: TimerTask,
}

#[derive(Clone, Debug)]
struct TimerEntry {
    handle: TimerHandle,
    due: u64,
    order: u64,
    interval: Option<u64>,
    task: TimerTask,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: u64,
    next_handle: u64,
    next_order: u64,
    queue: Vec<TimerEntry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub(crate) fn schedule(
        &mut self,
        delay: u64,
        interval: Option<u64>,
        task: TimerTask,
    ) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(TimerEntry {
            handle,
            due: self.now + delay.max(1),
            order,
            interval: interval.map(|ms| ms.max(1)),
            task,
        });
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) {
        self.queue.retain(|entry| entry.handle != handle);
    }

    pub fn armed(&self, handle: TimerHandle) -> bool {
        self.queue.iter().any(|entry| entry.handle == handle)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Pops the earliest entry due at or before `target` and moves the clock
    /// to its due time. Interval entries are re-armed before being returned.
    pub(crate) fn pop_due(&mut self, target: u64) -> Option<DueTimer> {
        let index = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= target)
            .min_by_key(|(_, entry)| (entry.due, entry.order))
            .map(|(index, _)| index)?;
        let mut entry = self.queue.swap_remove(index);
        self.now = entry.due;
        let due = DueTimer {
            task: entry.task.clone(),
        };
        if let Some(interval) = entry.interval {
            entry.due += interval;
            entry.order = self.next_order;
            self.next_order += 1;
            self.queue.push(entry);
        }
        Some(due)
    }

    /// Settles the clock at `target` once every due entry was drained.
    pub(crate) fn settle(&mut self, target: u64) {
        if target > self.now {
            self.now = target;
        }
    }
}
