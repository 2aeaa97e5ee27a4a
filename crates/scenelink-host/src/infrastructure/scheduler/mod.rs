//! Main-thread handoff queue.
//!
//! Scene graphs are not safe for concurrent mutation, and most hosts demand
//! that all graph changes happen on one designated thread. The network
//! thread therefore never touches the scene: its callbacks push
//! [`HostEvent`]s into a [`MainThreadQueue`], and the mutation context
//! drains the queue on its own schedule (the headless binary does it once
//! per tick; a real host adapter would do it from the engine's
//! main-thread-timer hook).
//!
//! Pushing is non-blocking and thread-safe; draining is only ever done by
//! the single mutation context.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use scenelink_core::protocol::messages::Message;

use crate::infrastructure::network::{ConnectionHandle, ServerCallbacks};

/// One unit of work marshalled to the mutation context.
#[derive(Debug)]
pub enum HostEvent {
    /// A driver connected; the handle sends back to it.
    ConnectionStarted(ConnectionHandle),
    /// A decoded command to apply.
    Command(Message),
    /// The driver connection ended; tear the session down.
    ConnectionEnded,
}

/// FIFO queue between the network thread and the mutation context.
#[derive(Default)]
pub struct MainThreadQueue {
    inner: Mutex<VecDeque<HostEvent>>,
}

impl MainThreadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an event. Never blocks.
    pub fn push(&self, event: HostEvent) {
        self.inner
            .lock()
            .expect("main-thread queue lock poisoned")
            .push_back(event);
    }

    /// Takes everything queued so far, in arrival order.
    pub fn drain(&self) -> Vec<HostEvent> {
        let mut queue = self
            .inner
            .lock()
            .expect("main-thread queue lock poisoned");
        queue.drain(..).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("main-thread queue lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adapts a shared queue to the server's callback triple: every
    /// callback just posts the corresponding event.
    pub fn callbacks(queue: &Arc<MainThreadQueue>) -> ServerCallbacks {
        let on_command = Arc::clone(queue);
        let on_start = Arc::clone(queue);
        let on_end = Arc::clone(queue);
        ServerCallbacks {
            on_command: Arc::new(move |msg| on_command.push(HostEvent::Command(msg))),
            on_connection_start: Arc::new(move |handle| {
                on_start.push(HostEvent::ConnectionStarted(handle))
            }),
            on_connection_end: Arc::new(move || on_end.push(HostEvent::ConnectionEnded)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_arrival_order() {
        let queue = MainThreadQueue::new();
        queue.push(HostEvent::Command(Message::Clear));
        queue.push(HostEvent::ConnectionEnded);

        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], HostEvent::Command(Message::Clear)));
        assert!(matches!(events[1], HostEvent::ConnectionEnded));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_on_empty_queue_returns_nothing() {
        let queue = MainThreadQueue::new();
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_callbacks_post_into_the_queue() {
        let queue = Arc::new(MainThreadQueue::new());
        let callbacks = MainThreadQueue::callbacks(&queue);

        let (handle, _rx) = ConnectionHandle::channel();
        (callbacks.on_connection_start)(handle);
        (callbacks.on_command)(Message::Clear);
        (callbacks.on_connection_end)();

        let events = queue.drain();
        assert!(matches!(events[0], HostEvent::ConnectionStarted(_)));
        assert!(matches!(events[1], HostEvent::Command(Message::Clear)));
        assert!(matches!(events[2], HostEvent::ConnectionEnded));
    }

    #[test]
    fn test_pushes_from_other_threads_arrive() {
        let queue = Arc::new(MainThreadQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        queue.push(HostEvent::Command(Message::Clear));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 400);
    }
}
