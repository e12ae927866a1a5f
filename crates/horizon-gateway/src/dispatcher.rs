use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock, broadcast};
use uuid::Uuid;

use horizon_types::events::ServerEvent;

/// Capacity of the broadcast channel. Receivers that fall this far behind
/// skip frames (RecvError::Lagged) instead of blocking the sender.
const BROADCAST_CAPACITY: usize = 1024;

/// Who receives an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connected client, the originator included.
    Everyone,
    /// Every connected client except the originator.
    Others,
}

/// One outbound event plus the audience that should receive it. Every
/// connection sees every frame on the broadcast channel; the send side of a
/// connection drops frames its audience excludes.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub origin: Uuid,
    pub audience: Audience,
    pub event: ServerEvent,
}

impl Outbound {
    /// Whether the connection identified by `conn_id` should receive this frame.
    pub fn delivers_to(&self, conn_id: Uuid) -> bool {
        match self.audience {
            Audience::Everyone => true,
            Audience::Others => self.origin != conn_id,
        }
    }
}

/// Manages all connected clients and fans events out to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<Outbound>,

    /// Live sessions: connection id -> username, once the client joined.
    /// Usernames are not deduplicated; two sessions may share one.
    sessions: RwLock<HashMap<Uuid, Option<String>>>,

    /// Inbound events run one at a time: a mutation and the broadcast built
    /// from it must stay atomic relative to every other inbound event.
    event_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                sessions: RwLock::new(HashMap::new()),
                event_lock: Mutex::new(()),
            }),
        }
    }

    /// Subscribe to outbound frames. Each connection calls this once.
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Hold this guard for the span of one inbound event, store mutation
    /// through dispatch. It reproduces the single-threaded dispatch loop of
    /// the protocol: without it, two updates to the same message could
    /// broadcast their snapshots in the wrong order.
    pub async fn event_guard(&self) -> MutexGuard<'_, ()> {
        self.inner.event_lock.lock().await
    }

    /// Fan a frame out to all subscribed connections. Fire-and-forget: a
    /// send with no receivers is fine, and nothing is retried.
    pub fn dispatch(&self, frame: Outbound) {
        let _ = self.inner.broadcast_tx.send(frame);
    }

    /// Register a new connection. Returns its id.
    pub async fn register(&self) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner.sessions.write().await.insert(conn_id, None);
        conn_id
    }

    /// Bind a username to a connection for its lifetime. Re-joins simply
    /// refresh the binding.
    pub async fn bind_username(&self, conn_id: Uuid, username: &str) {
        if let Some(session) = self.inner.sessions.write().await.get_mut(&conn_id) {
            *session = Some(username.to_string());
        }
    }

    /// Drop a connection's session. Returns the username it had joined as,
    /// if any. Leaving is silent: no event is broadcast here.
    pub async fn unregister(&self, conn_id: Uuid) -> Option<String> {
        self.inner.sessions.write().await.remove(&conn_id).flatten()
    }

    /// Number of currently connected clients.
    pub async fn connection_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{self, Mutation};
    use chrono::Utc;

    #[tokio::test]
    async fn everyone_frames_reach_all_connections() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.register().await;
        let b = dispatcher.register().await;
        let mut a_rx = dispatcher.subscribe();
        let mut b_rx = dispatcher.subscribe();

        dispatcher.dispatch(router::route(
            a,
            Mutation::Deleted { message_id: "m1".into() },
        ));

        let to_a = a_rx.recv().await.unwrap();
        let to_b = b_rx.recv().await.unwrap();
        assert!(to_a.delivers_to(a));
        assert!(to_b.delivers_to(b));
    }

    #[tokio::test]
    async fn join_frames_skip_the_joining_connection() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.register().await;
        let b = dispatcher.register().await;
        let c = dispatcher.register().await;
        let mut rx = dispatcher.subscribe();

        dispatcher.dispatch(router::route(
            a,
            Mutation::Joined { username: "A".into(), timestamp: Utc::now() },
        ));

        // one frame, delivered to exactly n-1 of the n connections
        let frame = rx.recv().await.unwrap();
        let delivered: Vec<bool> =
            [a, b, c].iter().map(|id| frame.delivers_to(*id)).collect();
        assert_eq!(delivered, vec![false, true, true]);
    }

    #[tokio::test]
    async fn sessions_track_join_state_and_count() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.register().await;
        let b = dispatcher.register().await;
        assert_eq!(dispatcher.connection_count().await, 2);

        dispatcher.bind_username(a, "A").await;
        // rebinding refreshes, no dedup against other sessions
        dispatcher.bind_username(b, "A").await;

        assert_eq!(dispatcher.unregister(a).await.as_deref(), Some("A"));
        assert_eq!(dispatcher.connection_count().await, 1);
        assert_eq!(dispatcher.unregister(b).await.as_deref(), Some("A"));

        // a connection that never joined has no username to report
        let c = dispatcher.register().await;
        assert_eq!(dispatcher.unregister(c).await, None);
    }
}
