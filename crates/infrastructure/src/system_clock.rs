use bulwark_application::Clock;
use chrono::{DateTime, Utc};

/// Clock adapter reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
