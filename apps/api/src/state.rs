use std::sync::Arc;

use bulwark_application::SecurityEventService;

use crate::protection_registry::ProtectionRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub protection_registry: Arc<ProtectionRegistry>,
    pub security_event_service: SecurityEventService,
}
