use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

use parlor_types::events::GatewayEvent;

/// Fans room events out to every connected WebSocket.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events. Each connection filters by its
    /// own subscriptions.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    connections: AtomicUsize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. Having no listeners is
    /// not an error.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn connection_opened(&self) -> usize {
        self.inner.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) -> usize {
        self.inner.connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.load(Ordering::Relaxed)
    }
}

/// Rooms a single connection listens to. Shared between its send and
/// receive halves.
#[derive(Clone, Default)]
pub struct Subscriptions {
    rooms: Arc<RwLock<HashSet<Uuid>>>,
}

impl Subscriptions {
    pub fn add(&self, room_ids: &[Uuid]) {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        rooms.extend(room_ids.iter().copied());
    }

    pub fn remove(&self, room_ids: &[Uuid]) {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        for id in room_ids {
            rooms.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Room-scoped events pass only for subscribed rooms; connection-level
    /// events are never broadcast, so they are rejected here too.
    pub fn accepts(&self, event: &GatewayEvent) -> bool {
        match event.chat_room_id() {
            Some(room) => self.rooms.read().unwrap_or_else(PoisonError::into_inner).contains(&room),
            None => false,
        }
    }
}
