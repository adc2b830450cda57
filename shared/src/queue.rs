//! Task queue between the receive activity and the dispatch loop
//!
//! The dispatch loop owns the [`TaskQueue`]; the receive side only ever holds
//! a [`TaskSender`]. Tasks pushed from one sender come out in push order.

use tokio::sync::mpsc;

use crate::Task;

/// Push side of the queue, cheap to clone and safe to use from any thread
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskSender {
    /// Enqueue a task. Returns false once the owning queue has been dropped.
    pub fn push(&self, task: Task) -> bool {
        self.tx.send(task).is_ok()
    }
}

/// Ordered buffer of pending tasks
#[derive(Debug)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
    rx: mpsc::UnboundedReceiver<Task>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Get a handle for pushing tasks
    pub fn sender(&self) -> TaskSender {
        TaskSender {
            tx: self.tx.clone(),
        }
    }

    /// Drain every pending task, oldest first. Empty if nothing is pending.
    pub fn pop_all(&mut self) -> Vec<Task> {
        let mut tasks = Vec::new();
        while let Ok(task) = self.rx.try_recv() {
            tasks.push(task);
        }
        tasks
    }

    /// Number of tasks waiting to be drained
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_fifo_single_sender() {
        let mut queue = TaskQueue::new();
        let sender = queue.sender();
        for id in ["1", "2", "3"] {
            assert!(sender.push(Task::save(id)));
        }

        assert_eq!(queue.len(), 3);
        let tasks = queue.pop_all();
        assert_eq!(ids(&tasks), vec!["1", "2", "3"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_senders_preserve_per_sender_order() {
        let mut queue = TaskQueue::new();
        let numbers = queue.sender();
        let letters = queue.sender();

        let a = thread::spawn(move || {
            for id in ["1", "2", "3"] {
                numbers.push(Task::save(id));
            }
        });
        let b = thread::spawn(move || {
            for id in ["a", "b"] {
                letters.push(Task::save(id));
            }
        });
        a.join().unwrap();
        b.join().unwrap();

        let tasks = queue.pop_all();
        let drained = ids(&tasks);
        assert_eq!(drained.len(), 5);

        let numbers: Vec<_> = drained.iter().filter(|id| id.parse::<u32>().is_ok()).collect();
        let letters: Vec<_> = drained.iter().filter(|id| id.parse::<u32>().is_err()).collect();
        assert_eq!(numbers, vec![&"1", &"2", &"3"]);
        assert_eq!(letters, vec![&"a", &"b"]);
    }

    #[test]
    fn test_pop_all_on_empty_queue() {
        let mut queue = TaskQueue::new();
        assert!(queue.pop_all().is_empty());
        assert!(queue.pop_all().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_later_pushes_come_after_drain() {
        let mut queue = TaskQueue::new();
        let sender = queue.sender();

        sender.push(Task::save("first"));
        assert_eq!(ids(&queue.pop_all()), vec!["first"]);

        sender.push(Task::save("second"));
        assert_eq!(ids(&queue.pop_all()), vec!["second"]);
    }

    #[test]
    fn test_push_after_queue_dropped() {
        let queue = TaskQueue::new();
        let sender = queue.sender();
        drop(queue);
        assert!(!sender.push(Task::save("lost")));
    }
}
