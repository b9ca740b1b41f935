//! Connection guard
//!
//! The guard owns a memoized future built once at construction. The first
//! await drives the single connection attempt; concurrent and later waiters
//! share that same attempt and observe the same outcome. There is no retry
//! and no reconnection: a failed bring-up stays failed for the lifetime of
//! the guard.

use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;

use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event};
use crate::storage::{Connector, StorageEngine};

/// Shared completion signal of the bring-up
pub type ReadySignal = Shared<BoxFuture<'static, StoreResult<Arc<dyn StorageEngine>>>>;

/// Single-flight connection bring-up
pub struct ConnectionGuard {
    signal: ReadySignal,
}

impl ConnectionGuard {
    /// Prepare the bring-up. Nothing is attempted until the first await.
    pub fn new(config: &StoreConfig, connector: Arc<dyn Connector>) -> Self {
        let config = config.clone();

        let attempt = async move {
            let prepared = config.validate().and_then(|()| config.apply_logging());

            log_event_with_fields(
                Event::ConnectBegin,
                &[
                    ("database", config.database.as_str()),
                    ("url", config.url.as_str()),
                ],
            );

            let connected = match prepared {
                Ok(()) => connector.connect(&config).await,
                Err(err) => Err(err),
            };

            match connected {
                Ok(engine) => {
                    log_event_with_fields(
                        Event::ConnectComplete,
                        &[("database", engine.database())],
                    );
                    Ok(engine)
                }
                Err(err) => {
                    let err = match err {
                        StoreError::ConnectionFailure(_) => err,
                        other => StoreError::ConnectionFailure(other.to_string()),
                    };
                    let message = err.to_string();
                    log_event_with_fields(
                        Event::ConnectFailed,
                        &[("code", err.code()), ("error", message.as_str())],
                    );
                    Err(err)
                }
            }
        };

        Self {
            signal: attempt.boxed().shared(),
        }
    }

    /// The completion signal. Awaiting any clone of it is safe and yields
    /// the same outcome.
    pub fn ready(&self) -> ReadySignal {
        self.signal.clone()
    }

    /// Await bring-up and return the engine
    pub async fn engine(&self) -> StoreResult<Arc<dyn StorageEngine>> {
        self.signal.clone().await
    }

    /// Outcome of the bring-up, if it has completed
    pub fn outcome(&self) -> Option<StoreResult<Arc<dyn StorageEngine>>> {
        self.signal.peek().cloned()
    }

    /// Whether the bring-up has completed, successfully or not
    pub fn is_settled(&self) -> bool {
        self.signal.peek().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryConnector;

    #[tokio::test]
    async fn test_lazy_until_awaited() {
        let connector = MemoryConnector::new();
        let guard = ConnectionGuard::new(&StoreConfig::default(), Arc::new(connector.clone()));

        assert_eq!(connector.attempts(), 0);
        assert!(!guard.is_settled());

        guard.engine().await.unwrap();
        assert_eq!(connector.attempts(), 1);
        assert!(guard.is_settled());
    }

    #[tokio::test]
    async fn test_repeated_awaits_share_one_attempt() {
        let connector = MemoryConnector::new();
        let guard = ConnectionGuard::new(&StoreConfig::default(), Arc::new(connector.clone()));

        let first = guard.engine().await.unwrap();
        let second = guard.ready().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_sticky() {
        let connector = MemoryConnector::failing("refused");
        let guard = ConnectionGuard::new(&StoreConfig::default(), Arc::new(connector.clone()));

        let first = guard.engine().await.err().unwrap();
        let second = guard.engine().await.err().unwrap();

        assert_eq!(first, StoreError::ConnectionFailure("refused".into()));
        assert_eq!(first, second);
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_scheme_fails() {
        let config = StoreConfig::new("mongodb://localhost:27017", "app");
        let guard = ConnectionGuard::new(&config, Arc::new(MemoryConnector::new()));

        let err = guard.engine().await.err().unwrap();
        assert!(err.is_fatal());
        assert!(matches!(guard.outcome(), Some(Err(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_without_connecting() {
        let connector = MemoryConnector::new();
        let mut config = StoreConfig::default();
        config.log_level = "loud".into();
        let guard = ConnectionGuard::new(&config, Arc::new(connector.clone()));

        let err = guard.engine().await.err().unwrap();
        assert_eq!(err.code(), "DOCQ_CONNECTION_FAILED");
        assert_eq!(connector.attempts(), 0);
    }
}
