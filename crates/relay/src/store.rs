//! Session store with idle expiry
//!
//! Concurrent map from session id to per-session state. Lookups and
//! activity refresh share the read lock; insertion and the periodic
//! sweep take the write lock. A handler may keep its `Arc<Session>`
//! across await points after the lock is released — eviction between a
//! refresh and later use only drops idle sessions, so the race is
//! benign.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// State for one established session.
pub struct Session {
    key: Vec<u8>,
    created_at: Instant,
    /// Milliseconds after `created_at` of the most recent accepted
    /// request. Atomic so a refresh can share the store's read lock.
    active_offset_ms: AtomicU64,
}

impl Session {
    fn new(key: Vec<u8>) -> Self {
        Self {
            key,
            created_at: Instant::now(),
            active_offset_ms: AtomicU64::new(0),
        }
    }

    /// Per-session symmetric key, immutable after the handshake.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Time since the session last saw an accepted request.
    pub fn idle_for(&self) -> Duration {
        let elapsed = self.created_at.elapsed().as_millis() as u64;
        let active = self.active_offset_ms.load(Ordering::Relaxed);
        Duration::from_millis(elapsed.saturating_sub(active))
    }

    fn refresh(&self) {
        let now = self.created_at.elapsed().as_millis() as u64;
        self.active_offset_ms.store(now, Ordering::Relaxed);
    }
}

/// Concurrent session map with idle expiry.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_idle: Duration,
}

impl SessionStore {
    pub fn new(max_idle: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_idle,
        }
    }

    /// Look up a session without marking it active.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Mark a session active now and return it. A no-op miss for
    /// unknown ids.
    pub async fn touch(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned();
        if let Some(ref session) = session {
            session.refresh();
        }
        session
    }

    /// Insert a session unless the id is already taken. A repeated
    /// handshake for a live id leaves the existing session, and its
    /// key, untouched.
    pub async fn create_if_absent(&self, id: &str, key: Vec<u8>) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Session::new(key)));
    }

    /// Remove every session idle at least `max_idle`. Returns the
    /// number of evicted sessions.
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for() < self.max_idle);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn max_idle(&self) -> Duration {
        self.max_idle
    }

    /// Spawn the background sweep loop. It wakes once per `max_idle`
    /// (worst-case staleness is twice the TTL) and runs until the
    /// returned handle is stopped; a stop lands between sweeps, never
    /// mid-sweep.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let store = Arc::clone(self);

        let task = tokio::spawn(async move {
            // interval panics on a zero period.
            let period = store.max_idle.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = store.sweep().await;
                        if evicted > 0 {
                            debug!("Swept {} idle session(s)", evicted);
                        }
                    }
                    _ = stop_rx.recv() => {
                        debug!("Session sweeper stopping");
                        break;
                    }
                }
            }
        });

        SweeperHandle { stop_tx, task }
    }
}

/// Handle to the background sweep loop. Dropping the handle closes the
/// stop channel, which also terminates the loop.
pub struct SweeperHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new(Duration::from_secs(60));

        store.create_if_absent("s1", vec![1u8; 32]).await;

        let session = store.get("s1").await.unwrap();
        assert_eq!(session.key(), &[1u8; 32]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_create_if_absent_keeps_original_key() {
        let store = SessionStore::new(Duration::from_secs(60));

        store.create_if_absent("s1", vec![1u8; 32]).await;
        store.create_if_absent("s1", vec![2u8; 32]).await;

        let session = store.get("s1").await.unwrap();
        assert_eq!(session.key(), &[1u8; 32]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_touch_refreshes_activity() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.create_if_absent("s1", vec![1u8; 32]).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let session = store.touch("s1").await.unwrap();

        assert!(session.idle_for() < Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_touch_unknown_is_noop() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.touch("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired() {
        let store = SessionStore::new(Duration::from_millis(40));

        store.create_if_absent("old", vec![1u8; 32]).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        store.create_if_absent("fresh", vec![2u8; 32]).await;

        let evicted = store.sweep().await;

        assert_eq!(evicted, 1);
        assert!(store.get("old").await.is_none());
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_touched_session_survives_sweep() {
        let store = SessionStore::new(Duration::from_millis(40));
        store.create_if_absent("s1", vec![1u8; 32]).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.touch("s1").await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.sweep().await, 0);
        assert!(store.get("s1").await.is_some());
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let store = Arc::new(SessionStore::new(Duration::from_millis(50)));
        let sweeper = store.spawn_sweeper();

        store.create_if_absent("s1", vec![1u8; 32]).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(store.is_empty().await);
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_sweeper_stop_is_deterministic() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(3600)));
        let sweeper = store.spawn_sweeper();

        tokio::time::timeout(Duration::from_secs(1), sweeper.stop())
            .await
            .expect("sweeper did not stop");
    }

    #[tokio::test]
    async fn test_evicted_session_handle_stays_usable() {
        // A handler holding an Arc across eviction keeps a working key.
        let store = SessionStore::new(Duration::from_millis(10));
        store.create_if_absent("s1", vec![1u8; 32]).await;

        let session = store.touch("s1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.sweep().await;

        assert!(store.get("s1").await.is_none());
        assert_eq!(session.key(), &[1u8; 32]);
    }
}
