use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bulwark_core::AppResult;
use bulwark_domain::{Identity, SecurityEvent, SecurityEventType};

use crate::Clock;
use crate::network_timeout::{DEFAULT_NETWORK_TIMEOUT, with_timeout};

/// Repository port for security audit log persistence.
#[async_trait]
pub trait SecurityEventRepository: Send + Sync {
    /// Appends a security event entry.
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()>;
}

/// Application service for best-effort security event recording.
#[derive(Clone)]
pub struct SecurityEventService {
    repository: Arc<dyn SecurityEventRepository>,
    clock: Arc<dyn Clock>,
    user_agent: Option<String>,
    identity: Option<Identity>,
    network_timeout: Duration,
}

impl SecurityEventService {
    /// Creates a service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn SecurityEventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            user_agent: None,
            identity: None,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    /// Returns a copy that attaches the caller's user agent and identity.
    #[must_use]
    pub fn for_caller(&self, user_agent: Option<String>, identity: Option<Identity>) -> Self {
        Self {
            user_agent,
            identity,
            ..self.clone()
        }
    }

    /// Overrides the limit applied to the append call.
    #[must_use]
    pub fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = network_timeout;
        self
    }

    /// Persists an event. Failures are logged and never returned.
    pub async fn log_event(&self, event_type: SecurityEventType, details: Value) {
        let event = SecurityEvent {
            event_type,
            details,
            user_agent: self.user_agent.clone(),
            identity: self.identity.clone(),
            created_at: self.clock.now(),
        };
        let event_type = event.event_type.as_str().to_owned();

        match with_timeout(
            self.network_timeout,
            "security event append",
            self.repository.append_event(event),
        )
        .await
        {
            Ok(()) => debug!(event_type = %event_type, "security event recorded"),
            Err(error) => {
                warn!(event_type = %event_type, error = %error, "failed to record security event");
            }
        }
    }

    /// Detaches [`Self::log_event`] onto the runtime.
    pub fn spawn_event(&self, event_type: SecurityEventType, details: Value) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move { service.log_event(event_type, details).await })
    }

    /// Records a refused access to `resource`.
    pub async fn log_unauthorized_access(&self, resource: &str) {
        self.log_event(
            SecurityEventType::UnauthorizedAccess,
            json!({ "resource": resource }),
        )
        .await;
    }

    /// Records an administrative action with extra detail fields.
    pub async fn log_admin_action(&self, action: &str, details: Value) {
        self.log_event(
            SecurityEventType::AdminAction,
            merge_details(json!({ "action": action }), details),
        )
        .await;
    }

    /// Records a sign-in attempt.
    pub async fn log_login_attempt(&self, email: &str, success: bool) {
        self.log_event(
            SecurityEventType::LoginAttempt,
            json!({ "email": email, "success": success }),
        )
        .await;
    }

    /// Records access to a table.
    pub async fn log_data_access(&self, table: &str, operation: &str) {
        self.log_event(
            SecurityEventType::DataAccess,
            json!({ "table": table, "operation": operation }),
        )
        .await;
    }

    /// Records a broken security rule with extra detail fields.
    pub async fn log_security_violation(&self, violation: &str, details: Value) {
        self.log_event(
            SecurityEventType::SecurityViolation,
            merge_details(json!({ "violation": violation }), details),
        )
        .await;
    }
}

/// Merges the fields of `extra` into `base`. Non-object extras are kept
/// under `extra`.
fn merge_details(base: Value, extra: Value) -> Value {
    let mut merged = match base {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_owned(), other);
            map
        }
    };

    match extra {
        Value::Object(fields) => merged.extend(fields),
        Value::Null => {}
        other => {
            merged.insert("extra".to_owned(), other);
        }
    }

    Value::Object(merged)
}
