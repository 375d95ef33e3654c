use chrono::{DateTime, Utc};

/// Wall-clock port.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}
