//! Topic routing: a static mapping from topic name to handler.
//!
//! The routing table is built once at broker construction and fixed for the
//! broker's lifetime - there is no hot-reload. Dispatch is an explicit
//! tagged lookup by topic name rather than dynamic interface satisfaction,
//! so the full set of handled topics is visible at the registration site.

use crate::message::Record;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque error type returned by topic handlers.
///
/// Handlers are external collaborators (tokenize-and-store, notification
/// senders, ...); the broker only cares whether processing failed, not why,
/// so their error type stays boxed at this boundary.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a handler invocation.
pub type HandlerFuture = BoxFuture<'static, std::result::Result<(), HandlerError>>;

/// A per-topic business handler.
///
/// `process` receives the record by reference and must capture whatever it
/// needs (payload bytes clone cheaply) before returning its future - the
/// worker keeps ownership of the record for the ack path. Handlers are
/// responsible for their own timeouts; the broker applies none.
pub trait TopicHandler: Send + Sync {
    fn process(&self, record: &Record) -> HandlerFuture;
}

impl<F> TopicHandler for F
where
    F: Fn(&Record) -> HandlerFuture + Send + Sync,
{
    fn process(&self, record: &Record) -> HandlerFuture {
        self(record)
    }
}

/// Static topic-to-handler registration table.
///
/// ```rust
/// use relaymq::{HandlerError, TopicRouter, message::Record};
/// use futures::FutureExt;
///
/// let router = TopicRouter::new()
///     .register("scraper.data", |_record: &Record| {
///         async { Ok::<(), HandlerError>(()) }.boxed()
///     })
///     .register("notifications", |_record: &Record| {
///         async { Ok::<(), HandlerError>(()) }.boxed()
///     });
///
/// assert!(router.lookup("scraper.data").is_some());
/// assert!(router.lookup("unknown").is_none());
/// ```
#[derive(Default)]
pub struct TopicRouter {
    handlers: HashMap<String, Arc<dyn TopicHandler>>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a topic. Registering the same topic twice
    /// replaces the earlier handler.
    pub fn register(mut self, topic: impl Into<String>, handler: impl TopicHandler + 'static) -> Self {
        self.handlers.insert(topic.into(), Arc::new(handler));
        self
    }

    /// Look up the handler for a topic, if one is registered.
    pub fn lookup(&self, topic: &str) -> Option<&Arc<dyn TopicHandler>> {
        self.handlers.get(topic)
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered topic names, for startup logging.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RecordId;
    use futures::FutureExt;

    fn record(topic: &str) -> Record {
        Record::new(topic, None, "payload", RecordId::new(0, 0))
    }

    #[tokio::test]
    async fn test_lookup_dispatches_to_registered_handler() {
        let router = TopicRouter::new().register("orders", |record: &Record| {
            let len = record.value.len();
            async move {
                assert_eq!(len, 7);
                Ok::<(), HandlerError>(())
            }
            .boxed()
        });

        let handler = router.lookup("orders").expect("handler registered");
        handler.process(&record("orders")).await.unwrap();
    }

    #[test]
    fn test_lookup_unknown_topic_returns_none() {
        let router = TopicRouter::new().register("orders", |_: &Record| {
            async { Ok::<(), HandlerError>(()) }.boxed()
        });

        assert!(router.lookup("payments").is_none());
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_reregistration_replaces_handler() {
        let router = TopicRouter::new()
            .register("orders", |_: &Record| {
                async { Ok::<(), HandlerError>(()) }.boxed()
            })
            .register("orders", |_: &Record| {
                async { Err::<(), HandlerError>("always fails".into()) }.boxed()
            });

        assert_eq!(router.len(), 1);
    }
}
