//! Fan-out of one input stream to many independent subscribers

use super::InputEvent;
use crate::keys::{Key, Modifier};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[derive(Clone, Default)]
pub struct Broadcast {
    shared: Arc<Shared>,
}

/// Device state established by the stream so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    /// Last pointer position, `None` until the pointer first moves
    pub pointer: Option<(i32, i32)>,
    pub held: BTreeSet<Modifier>,
}

impl InputSnapshot {
    fn apply(&mut self, event: &InputEvent) {
        match event {
            InputEvent::PointerMoved { x, y } => {
                self.pointer = Some((x.round() as i32, y.round() as i32));
            }
            InputEvent::KeyPressed(Key::Modifier(m)) => {
                self.held.insert(*m);
            }
            InputEvent::KeyReleased(Key::Modifier(m)) => {
                self.held.remove(m);
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct Hub {
    subscribers: Vec<(u64, Sender<InputEvent>)>,
    seen: InputSnapshot,
}

#[derive(Default)]
struct Shared {
    hub: Mutex<Hub>,
    next_id: AtomicU64,
}

impl Broadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> InputSubscription {
        let (tx, rx) = unbounded();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        // Snapshot and registration under one lock: the subscription sees
        // exactly the events the snapshot does not cover
        let mut hub = self.shared.hub.lock();
        hub.subscribers.push((id, tx));
        InputSubscription {
            id,
            rx,
            snapshot: hub.seen.clone(),
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Deliver to every live subscriber. Never blocks.
    pub fn emit(&self, event: InputEvent) {
        let mut hub = self.shared.hub.lock();
        hub.seen.apply(&event);
        hub.subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn snapshot(&self) -> InputSnapshot {
        self.shared.hub.lock().seen.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.hub.lock().subscribers.len()
    }
}

/// One listener instance. Dropping it stops delivery.
pub struct InputSubscription {
    id: u64,
    rx: Receiver<InputEvent>,
    snapshot: InputSnapshot,
    shared: Weak<Shared>,
}

impl InputSubscription {
    /// For use in `select!`
    pub fn receiver(&self) -> &Receiver<InputEvent> {
        &self.rx
    }

    /// Pointer and modifier state as of subscribing
    pub fn snapshot(&self) -> &InputSnapshot {
        &self.snapshot
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&self) -> Option<InputEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for InputSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.hub.lock().subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
