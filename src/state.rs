//! Application state: in-memory session store, lead markers, backend client, and sinks.
//!
//! This module owns:
//!   - sessions by id, each behind its own async mutex (one in-flight event per session)
//!     and stamped with its last use so abandoned tabs can be swept
//!   - the "already submitted" markers keyed by the browser's client key
//!   - the backend client (behind `LeadApi`)
//!   - the submission sink and its counters
//!
//! Nothing is persisted; a restart forgets every session and marker.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::backend::{BackendClient, BackendError, LeadApi};
use crate::config::AppConfig;
use crate::domain::LeadId;
use crate::flow::{FlowError, SessionState};
use crate::telemetry::{SubmissionSink, TelemetrySink};

pub type SessionHandle = Arc<Mutex<SessionState>>;

pub struct SessionSlot {
    pub handle: SessionHandle,
    pub last_seen: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionSlot>>>,
    pub markers: Arc<RwLock<HashMap<String, LeadId>>>,
    pub backend: Arc<dyn LeadApi>,
    pub sink: Arc<dyn SubmissionSink>,
    pub telemetry: Arc<TelemetrySink>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build state from env: load config and create the backend client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, BackendError> {
        let config = AppConfig::from_env();
        let backend = BackendClient::new(&config.backend)?;
        info!(
            target: "quiz_backend",
            base_url = %backend.base_url,
            timeout_secs = config.backend.timeout_secs,
            teremok_product = %config.teremok.product,
            formula_product = %config.formula.product,
            "Backend client ready"
        );
        let telemetry = Arc::new(TelemetrySink::default());
        Ok(Self::with_parts(config, Arc::new(backend), telemetry.clone(), telemetry))
    }

    pub fn with_parts(
        config: AppConfig,
        backend: Arc<dyn LeadApi>,
        sink: Arc<dyn SubmissionSink>,
        telemetry: Arc<TelemetrySink>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            markers: Arc::new(RwLock::new(HashMap::new())),
            backend,
            sink,
            telemetry,
            config: Arc::new(config),
        }
    }

    #[instrument(level = "debug", skip(self, s), fields(id = %s.id, quiz = ?s.quiz))]
    pub async fn insert_session(&self, s: SessionState) -> SessionHandle {
        let id = s.id;
        let handle = Arc::new(Mutex::new(s));
        let slot = SessionSlot { handle: handle.clone(), last_seen: Instant::now() };
        self.sessions.write().await.insert(id, slot);
        handle
    }

    /// Look up a session and mark it as used now.
    pub async fn session(&self, id: Uuid) -> Result<SessionHandle, FlowError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&id).ok_or(FlowError::UnknownSession(id))?;
        slot.last_seen = Instant::now();
        Ok(slot.handle.clone())
    }

    /// Drop a session (tab closed). Returns whether it existed.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_session(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions unused for at least `ttl`. A session with an event in flight is kept.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.last_seen.elapsed() < ttl || slot.handle.try_lock().is_err());
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "quiz_backend", evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Background sweep of idle sessions, every quarter of the TTL (at least once a second).
    /// Returns `None` when `session_ttl_secs` is 0.
    pub fn spawn_idle_sweeper(&self) -> Option<JoinHandle<()>> {
        if self.config.session_ttl_secs == 0 {
            info!(target: "quiz_backend", "Idle session eviction disabled");
            return None;
        }
        let ttl = Duration::from_secs(self.config.session_ttl_secs);
        let period = (ttl / 4).max(Duration::from_secs(1));
        let state = self.clone();
        info!(target: "quiz_backend", ttl_secs = ttl.as_secs(), "Idle session sweeper started");
        Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                state.evict_idle(ttl).await;
            }
        }))
    }

    /// Lead registered earlier from the same browser, if any.
    pub async fn known_lead(&self, client_key: Option<&str>) -> Option<LeadId> {
        let key = client_key?;
        self.markers.read().await.get(key).cloned()
    }

    pub async fn remember_lead(&self, client_key: &str, lead: LeadId) {
        debug!(target: "quiz_backend", %client_key, lead_id = %lead, "Remembering registered lead");
        self.markers.write().await.insert(client_key.to_string(), lead);
    }
}
