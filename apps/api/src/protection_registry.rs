//! Live protection sessions keyed by browser session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bulwark_application::{
    Clock, DEFAULT_ACTIVITY_LOG_KEY, ProtectionDependencies, ProtectionSession,
    ProtectionSettings,
};
use bulwark_domain::Identity;
use chrono::{DateTime, Utc};
use bulwark_infrastructure::StaticIdentityResolver;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct ProtectionRegistry {
    dependencies: ProtectionDependencies,
    settings: ProtectionSettings,
    idle_timeout: Duration,
    max_sessions: usize,
    sessions: RwLock<HashMap<String, Arc<ProtectionSession>>>,
}

impl ProtectionRegistry {
    #[must_use]
    pub fn new(
        dependencies: ProtectionDependencies,
        settings: ProtectionSettings,
        idle_timeout: Duration,
        max_sessions: usize,
    ) -> Self {
        Self {
            dependencies,
            settings,
            idle_timeout,
            max_sessions: max_sessions.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the session for `session_key`, starting one for `identity`
    /// when none is live.
    pub async fn session_for(
        &self,
        session_key: &str,
        identity: &Identity,
    ) -> Arc<ProtectionSession> {
        if let Some(session) = self.sessions.read().await.get(session_key) {
            return session.clone();
        }

        let dependencies = self
            .dependencies
            .with_identity_resolver(Arc::new(StaticIdentityResolver::new(identity.clone())));
        let started = Arc::new(
            ProtectionSession::start(
                dependencies,
                self.settings.clone(),
                format!("{DEFAULT_ACTIVITY_LOG_KEY}:{session_key}"),
            )
            .await,
        );

        // A concurrent request may have started the same session meanwhile.
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(session_key) && sessions.len() >= self.max_sessions {
            self.make_room(&mut sessions);
        }
        let session = sessions
            .entry(session_key.to_owned())
            .or_insert(started)
            .clone();
        debug!(session_key, identity = %identity, live_sessions = sessions.len(), "protection session ready");
        session
    }

    /// Drops sessions idle for longer than the configured timeout.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let evicted = self.retain_active(&mut sessions);

        if evicted > 0 {
            info!(evicted, live_sessions = sessions.len(), "evicted idle protection sessions");
        }

        evicted
    }

    /// Drops idle sessions, then the least recently active one if the
    /// registry is still full.
    fn make_room(&self, sessions: &mut HashMap<String, Arc<ProtectionSession>>) {
        let mut evicted = self.retain_active(sessions);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_activity())
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    sessions.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }

        warn!(evicted, max_sessions = self.max_sessions, "protection session registry full");
    }

    fn retain_active(&self, sessions: &mut HashMap<String, Arc<ProtectionSession>>) -> usize {
        let now = self.now();
        let idle_timeout = chrono::Duration::from_std(self.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::MAX);

        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity() < idle_timeout);
        before - sessions.len()
    }

    /// Reads the clock shared by every session.
    pub fn now(&self) -> DateTime<Utc> {
        self.dependencies.clock.now()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
