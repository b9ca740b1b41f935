//! Observable events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Bring-up
    /// Configuration loaded
    ConfigLoaded,
    /// The one-time connection attempt starts
    ConnectBegin,
    /// Connection established, storage reachable
    ConnectComplete,
    /// Connection attempt failed; every waiter observes the failure
    ConnectFailed,

    // Indexes
    /// Index created
    IndexCreated,
    /// Index creation failed and was discarded
    IndexCreateSkipped,
}

impl Event {
    /// Returns the event name as logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConnectBegin => "CONNECT_BEGIN",
            Event::ConnectComplete => "CONNECT_COMPLETE",
            Event::ConnectFailed => "CONNECT_FAILED",
            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexCreateSkipped => "INDEX_CREATE_SKIPPED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ConnectFailed => Severity::Error,
            Event::IndexCreated | Event::IndexCreateSkipped => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
