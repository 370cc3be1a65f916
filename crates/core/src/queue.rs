//! Blocking, capacity-bounded FIFO queue.
//!
//! This is the primitive the whole pipeline stands on: producers push
//! requests into one instance, workers pop them; workers push sample
//! events into a second instance, aggregators pop those.
//!
//! # Contract
//!
//! - `push` blocks the caller while the queue is full, then appends and
//!   wakes one waiting popper.
//! - `pop` blocks the caller while the queue is empty, then removes the
//!   head and wakes one waiting pusher.
//! - Element order is FIFO by enqueue order; every element pushed is
//!   popped exactly once; `0 <= len <= capacity` holds at all times.
//! - No fairness guarantee across waiters: "some waiter is woken" is all
//!   callers may assume. The data stays ordered, the wakeups do not.
//!
//! # Thread Safety
//!
//! One instance is shared by any number of producers and consumers; all
//! state lives behind a single mutex with one condition variable per wait
//! direction.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Blocking bounded FIFO queue of typed messages.
pub struct BoundedQueue<T> {
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` elements.
    ///
    /// # Panics
    /// A zero capacity is a programming error: every `push` would block
    /// forever. Asserted rather than reported.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Append an element, blocking while the queue is full.
    pub fn push(&self, item: T) {
        let mut queue = self.inner.lock().unwrap();
        while queue.len() == self.capacity {
            queue = self.not_full.wait(queue).unwrap();
        }
        queue.push_back(item);
        drop(queue);
        self.not_empty.notify_one();
    }

    /// Remove and return the head element, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut queue = self.inner.lock().unwrap();
        while queue.is_empty() {
            queue = self.not_empty.wait(queue).unwrap();
        }
        // The wait loop holds the lock, so the queue cannot be empty here.
        let item = queue.pop_front().unwrap();
        drop(queue);
        self.not_full.notify_one();
        item
    }

    /// Current element count.
    ///
    /// Diagnostic snapshot only: the value races with concurrent pushes and
    /// pops, so no consumer may use it to decide whether `pop` would block.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the queue is currently empty. Same racy-snapshot caveat as
    /// [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum element count, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn test_zero_capacity_panics() {
        let _ = BoundedQueue::<u32>::new(0);
    }

    #[test]
    fn test_fifo_single_producer_single_consumer() {
        let queue = Arc::new(BoundedQueue::new(4));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..100u32 {
                    queue.push(i);
                }
            })
        };

        for i in 0..100u32 {
            assert_eq!(queue.pop(), i);
        }
        producer.join().unwrap();
    }

    #[test]
    fn test_capacity_bound_holds_under_slow_consumer() {
        let capacity = 4;
        let queue = Arc::new(BoundedQueue::new(capacity));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..50u32 {
                    queue.push(i);
                }
            })
        };

        let mut popped = Vec::new();
        for _ in 0..50 {
            // Sample the length while the producer is saturating the queue.
            assert!(queue.len() <= capacity);
            popped.push(queue.pop());
            thread::sleep(Duration::from_micros(200));
        }

        producer.join().unwrap();
        assert_eq!(popped, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_overfill_loses_nothing() {
        // Push capacity + k items against a single consumer draining one at
        // a time; every item must come out exactly once.
        let capacity = 8;
        let total = capacity + 25;
        let queue = Arc::new(BoundedQueue::new(capacity));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..total {
                    queue.push(i);
                }
            })
        };

        let mut seen = vec![false; total];
        for _ in 0..total {
            let item = queue.pop();
            assert!(!seen[item], "item {item} popped twice");
            seen[item] = true;
        }

        producer.join().unwrap();
        assert!(seen.iter().all(|&s| s));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_randomized_concurrent_push_pop() {
        // Many producers, many consumers, seeded per-thread pacing. Checks
        // conservation: the union of popped items equals the union pushed.
        let queue = Arc::new(BoundedQueue::new(6));
        let producers = 4;
        let per_producer = 150u64;
        let total = producers as usize * per_producer as usize;

        let mut handles = Vec::new();
        for producer_id in 0..producers {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(900 + producer_id);
                for i in 0..per_producer {
                    queue.push(producer_id * per_producer + i);
                    if rng.gen_bool(0.1) {
                        thread::sleep(Duration::from_micros(rng.gen_range(1..50)));
                    }
                }
            }));
        }

        let consumers = 3;
        let collected = Arc::new(Mutex::new(Vec::new()));
        let mut consumer_handles = Vec::new();
        for consumer_id in 0..consumers {
            let queue = Arc::clone(&queue);
            let collected = Arc::clone(&collected);
            // Split the pops across consumers; total is divisible by 3 here.
            let share = total / consumers as usize;
            consumer_handles.push(thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(7000 + consumer_id);
                for _ in 0..share {
                    assert!(queue.len() <= queue.capacity());
                    let item = queue.pop();
                    collected.lock().unwrap().push(item);
                    if rng.gen_bool(0.1) {
                        thread::sleep(Duration::from_micros(rng.gen_range(1..50)));
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        for handle in consumer_handles {
            handle.join().unwrap();
        }

        let mut collected = collected.lock().unwrap().clone();
        collected.sort_unstable();
        let expected: Vec<u64> = (0..producers * per_producer).collect();
        assert_eq!(collected, expected);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_per_producer_order_preserved() {
        // With multiple producers interleaving, each producer's items must
        // still appear in that producer's push order.
        let queue = Arc::new(BoundedQueue::new(3));
        let producers = 3u64;
        let per_producer = 100u64;

        let mut handles = Vec::new();
        for producer_id in 0..producers {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0..per_producer {
                    queue.push((producer_id, i));
                }
            }));
        }

        let mut last_seen = vec![None; producers as usize];
        for _ in 0..producers * per_producer {
            let (producer_id, seq) = queue.pop();
            let last = &mut last_seen[producer_id as usize];
            if let Some(prev) = *last {
                assert!(seq > prev, "producer {producer_id} reordered");
            }
            *last = Some(seq);
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
