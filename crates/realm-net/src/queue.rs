//! Inbound packet queue shared by the network reader task and the frame loop.
//!
//! The reader task pushes decoded [`Message`]s as they arrive; the update loop
//! drains the queue once per frame. A single short critical section around a
//! [`VecDeque`] keeps FIFO order and makes [`PacketQueue::drain_all`] atomic
//! with respect to concurrent pushes.
//!
//! The queue is unbounded: a single session's volume is paced by the server.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::messages::Message;

/// Thread-safe, unbounded FIFO of messages. Never blocks beyond the lock.
#[derive(Default)]
pub struct PacketQueue {
    inner: Mutex<VecDeque<Message>>,
}

impl PacketQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail.
    pub fn push(&self, message: Message) {
        self.inner.lock().push_back(message);
    }

    /// Remove and return the head, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<Message> {
        self.inner.lock().pop_front()
    }

    /// Remove and return everything currently queued, oldest first.
    ///
    /// A concurrent [`push`](Self::push) lands either in the returned batch or
    /// in the queue for the next drain.
    pub fn drain_all(&self) -> Vec<Message> {
        let drained = std::mem::take(&mut *self.inner.lock());
        Vec::from(drained)
    }

    /// Number of queued messages at the time of the call.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue was empty at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{GamePacket, Leave};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn game(kind: u16, seq: u32) -> Message {
        Message::Game(GamePacket {
            kind,
            payload: seq.to_le_bytes().to_vec(),
        })
    }

    fn seq_of(msg: &Message) -> (u16, u32) {
        match msg {
            Message::Game(p) => {
                let bytes: [u8; 4] = p.payload.as_slice().try_into().unwrap();
                (p.kind, u32::from_le_bytes(bytes))
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_pop_on_empty_returns_none() {
        let queue = PacketQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_single_producer_order_is_preserved() {
        let queue = PacketQueue::new();
        for i in 0..10 {
            queue.push(game(0, i));
        }

        let mut seen = Vec::new();
        seen.push(seq_of(&queue.pop().unwrap()).1);
        seen.push(seq_of(&queue.pop().unwrap()).1);
        seen.extend(queue.drain_all().iter().map(|m| seq_of(m).1));

        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_drain_twice_returns_empty_second_time() {
        let queue = PacketQueue::new();
        queue.push(Message::Leave(Leave));
        queue.push(game(1, 1));

        let first = queue.drain_all();
        let second = queue.drain_all();
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_concurrent_push_pop_drain_loses_and_duplicates_nothing() {
        const PRODUCERS: u16 = 4;
        const PER_PRODUCER: u32 = 5_000;

        let queue = Arc::new(PacketQueue::new());
        let done = Arc::new(AtomicBool::new(false));

        let consumer = {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                let mut toggle = false;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    toggle = !toggle;
                    if toggle {
                        seen.extend(queue.drain_all().iter().map(seq_of));
                    } else if let Some(msg) = queue.pop() {
                        seen.push(seq_of(&msg));
                    }
                    if finished && queue.is_empty() {
                        break;
                    }
                }
                seen
            })
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|kind| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        queue.push(game(kind, seq));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        let mut seen = consumer.join().unwrap();
        seen.extend(queue.drain_all().iter().map(seq_of));

        let total = (PRODUCERS as usize) * (PER_PRODUCER as usize);
        assert_eq!(seen.len(), total, "every message observed exactly once");
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(unique.len(), total, "no message observed twice");

        // Per-producer FIFO order survives interleaving.
        for kind in 0..PRODUCERS {
            let order: Vec<u32> = seen
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, s)| *s)
                .collect();
            assert_eq!(order, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}
