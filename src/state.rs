//! # Application State Management
//!
//! Shared state handed to every connection: configuration, the session
//! registry, the collaborator bundle, and artifact persistence. Everything
//! here is cheap to clone — the struct is a handle, the data lives behind
//! `Arc`s.
//!
//! Connection lifecycle is observable twice over: a live counter for the
//! health endpoint, and a broadcast channel for anything that wants
//! connect/disconnect events without polling.

use crate::artifacts::ArtifactStore;
use crate::config::AppConfig;
use crate::providers::Collaborators;
use crate::session::{ConnectionId, SessionRegistry};
use crate::storage::ObjectStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;

/// Connection lifecycle event published on the state's broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(ConnectionId),
    Disconnected(ConnectionId),
}

#[derive(Clone)]
pub struct AppState {
    /// Application configuration; readable from any handler
    pub config: Arc<RwLock<AppConfig>>,

    /// Active interview sessions keyed by connection id
    pub registry: Arc<SessionRegistry>,

    /// External service bundle (transcription, synthesis, generation, ...)
    pub collaborators: Collaborators,

    /// Remote artifact storage; `None` means uploads are skipped
    pub storage: Option<Arc<dyn ObjectStorage>>,

    /// Local artifact persistence (recordings, transcripts, logs, documents)
    pub artifacts: Arc<ArtifactStore>,

    /// Currently open WebSocket connections
    connections: Arc<AtomicUsize>,

    /// Connect/disconnect event fan-out
    events: broadcast::Sender<ConnectionEvent>,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        collaborators: Collaborators,
        storage: Option<Arc<dyn ObjectStorage>>,
        artifacts: ArtifactStore,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config: Arc::new(RwLock::new(config)),
            registry: Arc::new(SessionRegistry::new()),
            collaborators,
            storage,
            artifacts: Arc::new(artifacts),
            connections: Arc::new(AtomicUsize::new(0)),
            events,
            start_time: Instant::now(),
        }
    }

    /// Snapshot of the current configuration. Cloning releases the lock
    /// immediately so callers never hold it across await points.
    pub fn get_config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Record a new connection and publish the event.
    pub fn connection_opened(&self, id: ConnectionId) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        let _ = self.events.send(ConnectionEvent::Connected(id));
    }

    /// Record a closed connection and publish the event. The caller
    /// guarantees at-most-once per connection.
    pub fn connection_closed(&self, id: ConnectionId) {
        // Saturating: a miscounted close must not wrap the counter.
        let _ = self
            .connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        let _ = self.events.send(ConnectionEvent::Disconnected(id));
    }

    pub fn active_connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Subscribe to connection lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        AppState::new(
            AppConfig::default(),
            Collaborators::disabled(),
            None,
            artifacts,
        )
    }

    #[tokio::test]
    async fn test_connection_counter_tracks_open_and_close() {
        let state = test_state();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        state.connection_opened(a);
        state.connection_opened(b);
        assert_eq!(state.active_connections(), 2);

        state.connection_closed(a);
        assert_eq!(state.active_connections(), 1);

        // An extra close never wraps the counter.
        state.connection_closed(a);
        state.connection_closed(b);
        assert_eq!(state.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_events_are_broadcast_to_subscribers() {
        let state = test_state();
        let mut rx = state.subscribe_events();

        let id = ConnectionId::new();
        state.connection_opened(id);
        state.connection_closed(id);

        assert_eq!(rx.recv().await.unwrap(), ConnectionEvent::Connected(id));
        assert_eq!(rx.recv().await.unwrap(), ConnectionEvent::Disconnected(id));
    }
}
