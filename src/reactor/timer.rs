//! Min-heap of deadline-ordered scheduled tasks (§3, §4.5).
//!
//! Ties are broken by insertion order (FIFO): each entry carries a
//! monotonically increasing sequence number alongside its deadline, and the
//! heap orders on `(deadline, seq)` so `tick` always drains matured tasks in
//! non-decreasing deadline order, ties broken by insertion order (§4.5, §5).

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use super::entity::Task;

struct Entry {
    deadline: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Manages scheduled tasks and matures them against a supplied clock
/// reading. Invariant: `deadline(top) <= deadline(any other)`.
#[derive(Default)]
pub struct Timer {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Insert a task with the given absolute deadline.
    pub fn schedule(&mut self, deadline: Instant, task: Task) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Reverse(Entry {
            deadline,
            seq,
            task,
        }));
    }

    /// Remove and return every task with `deadline <= now`, in non-decreasing
    /// deadline order, ties broken by insertion order.
    pub fn tick(&mut self, now: Instant) -> Vec<Task> {
        let mut fired = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let Reverse(entry) = self.heap.pop().expect("peeked entry must be present");
            fired.push(entry.task);
        }
        fired
    }

    /// The nearest deadline still pending, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(e)| e.deadline)
    }

    /// Number of tasks still pending.
    pub fn tasks(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use qcheck_macros::quickcheck;

    /// FIFO tie-break (§4.5, §8 invariant 2): however many tasks share a
    /// deadline, `tick` must drain them in the order they were scheduled.
    #[quickcheck]
    fn prop_equal_deadlines_fire_in_schedule_order(count: u8) -> qcheck::TestResult {
        if count == 0 || count > 64 {
            return qcheck::TestResult::discard();
        }
        let mut timer = Timer::new();
        let now = Instant::now();
        let tasks: Vec<Task> = (0..count).map(|_| Task::new()).collect();
        for task in &tasks {
            timer.schedule(now, task.clone());
        }

        let fired = timer.tick(now);
        let in_order = fired.iter().zip(tasks.iter()).all(|(a, b)| a.ptr_eq(b));
        qcheck::TestResult::from_bool(in_order && fired.len() == tasks.len())
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut timer = Timer::new();
        let now = Instant::now();
        let a = Task::new();
        let b = Task::new();
        let c = Task::new();

        timer.schedule(now + Duration::from_secs(30), b.clone());
        timer.schedule(now + Duration::from_secs(10), a.clone());
        timer.schedule(now + Duration::from_secs(20), c.clone());

        assert_eq!(timer.tasks(), 3);
        assert_eq!(timer.deadline(), Some(now + Duration::from_secs(10)));

        let fired = timer.tick(now + Duration::from_secs(25));
        assert_eq!(fired.len(), 2);
        assert!(fired[0].ptr_eq(&a));
        assert!(fired[1].ptr_eq(&c));
        assert_eq!(timer.tasks(), 1);
    }

    #[test]
    fn ties_broken_by_insertion_order() {
        let mut timer = Timer::new();
        let now = Instant::now();
        let first = Task::new();
        let second = Task::new();
        let third = Task::new();

        timer.schedule(now, first.clone());
        timer.schedule(now, second.clone());
        timer.schedule(now, third.clone());

        let fired = timer.tick(now);
        assert!(fired[0].ptr_eq(&first));
        assert!(fired[1].ptr_eq(&second));
        assert!(fired[2].ptr_eq(&third));
    }

    #[test]
    fn tick_before_deadline_matures_nothing() {
        let mut timer = Timer::new();
        let now = Instant::now();
        timer.schedule(now + Duration::from_secs(5), Task::new());

        assert!(timer.tick(now).is_empty());
        assert_eq!(timer.tasks(), 1);
        assert_eq!(timer.deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn exhausted_timer_has_no_deadline() {
        let mut timer = Timer::new();
        let now = Instant::now();
        timer.schedule(now, Task::new());
        assert_eq!(timer.tick(now).len(), 1);
        assert_eq!(timer.deadline(), None);
        assert_eq!(timer.tasks(), 0);
    }
}
