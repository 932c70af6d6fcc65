//! In-process message bus.
//!
//! Decouples producers (ingress adapters, webhooks, heartbeat, swarm
//! announcements) from consumers (the agent loop inbound, channel adapters
//! outbound). One bus per app, constructor-injected - never a global.
//!
//! Guarantees: at-most-once delivery; inbound FIFO order (which preserves
//! order per `(channel, chat_id)`); no persistence across restart. On
//! overflow the oldest inbound message is dropped with a warning.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::message::{InboundMessage, OutboundMessage};

/// Handler invoked synchronously for each outbound message.
pub type OutboundHandler = Box<dyn Fn(&OutboundMessage) + Send + Sync>;

const DEFAULT_CAPACITY: usize = 256;

/// The process-wide message broker.
pub struct MessageBus {
    inbound: Mutex<VecDeque<InboundMessage>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    outbound: Mutex<Vec<OutboundHandler>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inbound: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            outbound: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue an inbound message. Non-blocking; drops the oldest message
    /// when the queue is full.
    pub fn publish_inbound(&self, msg: InboundMessage) {
        {
            let mut queue = self.inbound.lock().expect("bus inbound lock poisoned");
            if queue.len() >= self.capacity {
                if let Some(dropped) = queue.pop_front() {
                    warn!(
                        channel = %dropped.channel,
                        chat_id = %dropped.chat_id,
                        "Inbound queue full, dropping oldest message"
                    );
                }
            }
            queue.push_back(msg);
        }
        self.notify.notify_one();
    }

    /// Await the next inbound message. Returns `None` after `shutdown()`
    /// once the queue is empty.
    pub async fn drain(&self) -> Option<InboundMessage> {
        loop {
            // Register interest before checking the queue so a concurrent
            // publish between the check and the await cannot be missed.
            let notified = self.notify.notified();

            if let Some(msg) = self.inbound.lock().expect("bus inbound lock poisoned").pop_front() {
                return Some(msg);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }

            notified.await;
        }
    }

    /// Install a handler for outbound messages. Handlers run synchronously
    /// in publish order; multiple subscribers are allowed.
    pub fn subscribe_outbound(&self, handler: OutboundHandler) {
        self.outbound
            .lock()
            .expect("bus outbound lock poisoned")
            .push(handler);
    }

    /// Deliver an outbound message to every subscriber, in order.
    pub fn publish_outbound(&self, msg: OutboundMessage) {
        let handlers = self.outbound.lock().expect("bus outbound lock poisoned");
        for handler in handlers.iter() {
            handler(&msg);
        }
    }

    /// Signal shutdown. Pending messages are still drained; after that,
    /// `drain()` returns `None`.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Number of queued inbound messages.
    pub fn inbound_len(&self) -> usize {
        self.inbound.lock().expect("bus inbound lock poisoned").len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
