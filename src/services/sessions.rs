use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::booking::BookingService;
use crate::services::selection::SelectionController;

/// One open selection session. The mutex makes its events run one at a time.
pub struct Session {
    pub controller: Mutex<SelectionController>,
    last_active: Mutex<Instant>,
}

impl Session {
    pub async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    async fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_active.lock().await)
    }
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, service: BookingService) -> (Uuid, Arc<Session>) {
        let id = Uuid::new_v4();
        let session = Arc::new(Session {
            controller: Mutex::new(SelectionController::new(service)),
            last_active: Mutex::new(Instant::now()),
        });
        self.sessions.write().await.insert(id, session.clone());
        info!("selection session {} opened", id);
        (id, session)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn close(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!("selection session {} closed", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for longer than `max_idle`; returns how many went.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let snapshot: Vec<(Uuid, Arc<Session>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, session) in snapshot {
            if session.idle_for(now).await > max_idle {
                expired.push(id);
            }
        }

        if !expired.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &expired {
                sessions.remove(id);
            }
            info!("pruned {} idle selection sessions", expired.len());
        }
        expired.len()
    }

    /// Background loop that prunes idle sessions every `every`.
    pub fn spawn_cleanup(&self, every: Duration, max_idle: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        // tokio::time::interval panics on a zero period
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let pruned = registry.prune_idle(max_idle).await;
                debug!("session cleanup: {} pruned, {} open", pruned, registry.len().await);
            }
        })
    }
}
