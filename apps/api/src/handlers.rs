pub mod health;
pub mod protection;
pub mod security_events;
