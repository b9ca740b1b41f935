//! Observability for the store
//!
//! Structured JSON logging of lifecycle events. The CRUD path does not log;
//! failures there propagate to the caller instead.

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // No panic
        log_event_with_fields(Event::IndexCreateSkipped, &[("name", "email_1")]);
    }
}
