//! Thread-safe task priority queue.
//!
//! Binary max-heap over `(priority desc, arrival sequence asc)`, so tasks of the
//! same tier leave in the order they arrived. The heap is index-addressable so
//! removal and re-prioritization can fix a single slot instead of rebuilding.
//! One mutex guards the whole structure; a condition variable signals when it
//! becomes empty.

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::core::task::{Priority, Task};

/// Heap slot. The priority is cached so comparisons never touch task locks.
struct HeapEntry {
    priority: Priority,
    /// Arrival order for FIFO tie-breaking among equal priorities.
    sequence: u64,
    task: Arc<Task>,
}

impl HeapEntry {
    fn outranks(&self, other: &Self) -> bool {
        self.cmp_rank(other) == Ordering::Greater
    }

    fn cmp_rank(&self, other: &Self) -> Ordering {
        // Higher priority first; for equal priorities the earlier sequence wins.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct TaskHeap {
    entries: Vec<HeapEntry>,
    next_sequence: u64,
}

impl TaskHeap {
    fn push(&mut self, task: Arc<Task>) {
        let entry = HeapEntry {
            priority: task.priority(),
            sequence: self.next_sequence,
            task,
        };
        self.next_sequence += 1;
        self.entries.push(entry);
        self.sift_up(self.entries.len() - 1);
    }

    fn remove_at(&mut self, idx: usize) -> Option<Arc<Task>> {
        if idx >= self.entries.len() {
            return None;
        }
        let removed = self.entries.swap_remove(idx);
        if idx < self.entries.len() {
            self.fix(idx);
        }
        Some(removed.task)
    }

    fn fix(&mut self, idx: usize) {
        if !self.sift_up(idx) {
            self.sift_down(idx);
        }
    }

    /// Returns whether the entry moved.
    fn sift_up(&mut self, mut idx: usize) -> bool {
        let start = idx;
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.entries[idx].outranks(&self.entries[parent]) {
                break;
            }
            self.entries.swap(idx, parent);
            idx = parent;
        }
        idx != start
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut best = idx;
            if left < len && self.entries[left].outranks(&self.entries[best]) {
                best = left;
            }
            if right < len && self.entries[right].outranks(&self.entries[best]) {
                best = right;
            }
            if best == idx {
                return;
            }
            self.entries.swap(idx, best);
            idx = best;
        }
    }
}

/// Shared queue state. Tasks keep a weak handle to it while enqueued so
/// [`Task::set_priority`] can route through the queue.
#[derive(Default)]
pub(crate) struct QueueShared {
    heap: Mutex<TaskHeap>,
    drained: Condvar,
}

/// Thread-safe priority queue of tasks.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct PriorityQueue {
    shared: Arc<QueueShared>,
}

impl PriorityQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) const fn from_shared(shared: Arc<QueueShared>) -> Self {
        Self { shared }
    }

    /// Insert a task, assigning it the next arrival sequence. O(log n).
    pub fn push(&self, task: Arc<Task>) {
        let mut heap = self.shared.heap.lock();
        task.attach_queue(Arc::downgrade(&self.shared));
        heap.push(task);
    }

    /// Remove and return the highest-priority, earliest-arrived task.
    pub fn pop(&self) -> Option<Arc<Task>> {
        let mut heap = self.shared.heap.lock();
        let task = heap.remove_at(0)?;
        task.detach_queue();
        self.notify_if_empty(&heap);
        Some(task)
    }

    /// The task `pop` would return, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<Arc<Task>> {
        self.shared
            .heap
            .lock()
            .entries
            .first()
            .map(|e| Arc::clone(&e.task))
    }

    /// Remove the first task whose id matches. O(n + log n). `None` if absent.
    pub fn remove(&self, task_id: &str) -> Option<Arc<Task>> {
        let mut heap = self.shared.heap.lock();
        let idx = heap.entries.iter().position(|e| e.task.id() == task_id)?;
        let task = heap.remove_at(idx)?;
        task.detach_queue();
        self.notify_if_empty(&heap);
        Some(task)
    }

    /// Set the task's priority and, if it is enqueued here, restore heap order
    /// in the same critical section.
    pub fn update_priority(&self, task: &Task, priority: Priority) {
        let mut heap = self.shared.heap.lock();
        task.store_priority(priority);
        let position = heap
            .entries
            .iter()
            .position(|e| std::ptr::eq(Arc::as_ptr(&e.task), task));
        if let Some(idx) = position {
            heap.entries[idx].priority = priority;
            heap.fix(idx);
        }
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.heap.lock().entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every task, returned in pop order.
    pub fn drain(&self) -> Vec<Arc<Task>> {
        let mut heap = self.shared.heap.lock();
        let mut tasks = Vec::with_capacity(heap.entries.len());
        while let Some(task) = heap.remove_at(0) {
            task.detach_queue();
            tasks.push(task);
        }
        self.notify_if_empty(&heap);
        tasks
    }

    /// Block until the queue is empty. Uses a condition variable, no polling.
    pub fn wait_until_empty(&self) {
        let mut heap = self.shared.heap.lock();
        while !heap.entries.is_empty() {
            self.shared.drained.wait(&mut heap);
        }
    }

    fn notify_if_empty(&self, heap: &TaskHeap) {
        if heap.entries.is_empty() {
            self.shared.drained.notify_all();
        }
    }
}

impl std::fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityQueue").field("len", &self.len()).finish()
    }
}
