//! Mailbox kernel — cooperative message passing with deferred delivery.
//!
//! Every task in the node owns exactly one FIFO mailbox.  Tasks never
//! block on I/O; the only suspension point is "receive next message".
//! Timer-originated work is an ordinary message scheduled for future
//! delivery, so there is no callback reentrancy anywhere in the core.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Message Sources                          │
//! │                                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐   │
//! │  │ Network   │  │ Module    │  │ Deferred  │  │ Shell    │   │
//! │  │ events    │  │ reports   │  │ (timers)  │  │ commands │   │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬────┘   │
//! │        ▼              ▼              ▼              ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │        Kernel: one mailbox per TaskId (FIFO)           │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │              Node::step() → owning task handler              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each task has a single deferred slot.  Scheduling a new deferred message
//! for a task replaces whatever was pending (last-scheduler-wins); there is
//! no cancellation token.  Time is a virtual monotonic clock advanced by the
//! run loop, which keeps the whole runtime deterministic under test.

use embassy_time::{Duration, Instant};
use heapless::{Deque, Vec};
use log::{debug, warn};

use crate::app::commands::{Message, TaskId};
use crate::error::KernelError;

/// Per-task mailbox depth.
pub const MAILBOX_DEPTH: usize = 8;

/// Session task plus two cycles for each of up to eight modules.
pub const MAX_TASKS: usize = 17;

struct TaskSlot {
    id: TaskId,
    inbox: Deque<Message, MAILBOX_DEPTH>,
}

/// A message waiting for its delivery time.
struct Deferred {
    task: TaskId,
    msg: Message,
    due: Instant,
    /// Tie-breaker so equal deadlines deliver in scheduling order.
    seq: u64,
}

/// The mailbox kernel.
pub struct Kernel {
    now: Instant,
    tasks: Vec<TaskSlot, MAX_TASKS>,
    timers: Vec<Deferred, MAX_TASKS>,
    seq: u64,
    /// Round-robin start position for [`next_message`](Self::next_message).
    cursor: usize,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            now: Instant::MIN,
            tasks: Vec::new(),
            timers: Vec::new(),
            seq: 0,
            cursor: 0,
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Create a mailbox for `id`.  Spawning an existing task is a no-op.
    pub fn spawn(&mut self, id: TaskId) -> Result<(), KernelError> {
        if self.is_spawned(id) {
            return Ok(());
        }
        self.tasks
            .push(TaskSlot {
                id,
                inbox: Deque::new(),
            })
            .map_err(|_| KernelError::TooManyTasks)
    }

    pub fn is_spawned(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Deliver `msg` to `to` immediately (appended to its mailbox).
    pub fn post(&mut self, to: TaskId, msg: Message) -> Result<(), KernelError> {
        let slot = self
            .tasks
            .iter_mut()
            .find(|t| t.id == to)
            .ok_or(KernelError::UnknownTask)?;
        slot.inbox.push_back(msg).map_err(|_| {
            warn!("[kernel] mailbox {:?} full, dropping message", to);
            KernelError::MailboxFull
        })
    }

    /// Deliver `msg` to `to` once `delay` has elapsed, replacing any
    /// message already pending for that task.
    pub fn post_after(
        &mut self,
        to: TaskId,
        msg: Message,
        delay: Duration,
    ) -> Result<(), KernelError> {
        if !self.is_spawned(to) {
            return Err(KernelError::UnknownTask);
        }
        let due = self.now.checked_add(delay).unwrap_or(Instant::MAX);
        self.seq += 1;
        let seq = self.seq;

        if let Some(pending) = self.timers.iter_mut().find(|d| d.task == to) {
            debug!("[kernel] re-arming {:?}", to);
            *pending = Deferred { task: to, msg, due, seq };
            return Ok(());
        }
        self.timers
            .push(Deferred { task: to, msg, due, seq })
            .map_err(|_| KernelError::TooManyTimers)
    }

    /// Drop the deferred message pending for `to`.  Returns `true` if one
    /// was pending.
    pub fn cancel(&mut self, to: TaskId) -> bool {
        match self.timers.iter().position(|d| d.task == to) {
            Some(i) => {
                self.timers.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Delivery time of the message pending for `to`, if any.
    pub fn pending_deadline(&self, to: TaskId) -> Option<Instant> {
        self.timers.iter().find(|d| d.task == to).map(|d| d.due)
    }

    /// Earliest deferred delivery time across all tasks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|d| d.due).min()
    }

    /// Move the clock to `now` and deliver every deferred message that has
    /// come due, earliest first.  Returns the number delivered.  The clock
    /// never moves backwards.
    ///
    /// A due message whose mailbox is full stays pending and goes out on a
    /// later call once the task has drained.
    pub fn advance_to(&mut self, now: Instant) -> usize {
        if now > self.now {
            self.now = now;
        }
        let mut delivered = 0;
        while let Some(i) = self.earliest_due() {
            let d = self.timers.swap_remove(i);
            if self.post(d.task, d.msg).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Pop the next message, visiting task mailboxes round-robin.  Messages
    /// of one task always come out in delivery order.
    pub fn next_message(&mut self) -> Option<(TaskId, Message)> {
        let n = self.tasks.len();
        for offset in 0..n {
            let idx = (self.cursor + offset) % n;
            let slot = &mut self.tasks[idx];
            if let Some(msg) = slot.inbox.pop_front() {
                self.cursor = (idx + 1) % n;
                return Some((slot.id, msg));
            }
        }
        None
    }

    /// Messages waiting in `id`'s mailbox.
    pub fn queued(&self, id: TaskId) -> usize {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .map_or(0, |t| t.inbox.len())
    }

    /// `true` when no mailbox holds a message (deferred ones don't count).
    pub fn is_idle(&self) -> bool {
        self.tasks.iter().all(|t| t.inbox.is_empty())
    }

    fn has_room(&self, id: TaskId) -> bool {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .is_some_and(|t| !t.inbox.is_full())
    }

    fn earliest_due(&self) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, d)| d.due <= self.now && self.has_room(d.task))
            .min_by_key(|(_, d)| (d.due, d.seq))
            .map(|(i, _)| i)
    }
}
