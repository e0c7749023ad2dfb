//! Validating message dispatch.

use crate::message::{handler_key, Message};
use crate::schema::{SchemaRegistry, ValidationError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Handler for {key} failed: {source:#}")]
    Handler {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> anyhow::Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: Message) -> anyhow::Result<()> {
        (self.0)(message).await
    }
}

/// Wrap an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

pub trait MessageProcessor: Send + Sync {
    /// Install `handler` for a `"{protocolVersion}:{messageType}"` key,
    /// replacing any earlier one.
    fn register_handler(&self, key: &str, handler: Arc<dyn MessageHandler>);

    /// Validate and dispatch one raw frame.
    ///
    /// The returned future does the work; nothing happens until it is polled.
    fn process_message(&self, raw: String) -> BoxFuture<'static, Result<(), ProcessError>>;
}

struct Inner {
    schemas: SchemaRegistry,
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

/// Checks every frame against the schema registry before dispatching it.
#[derive(Clone)]
pub struct ValidatingMessageProcessor {
    inner: Arc<Inner>,
}

impl Default for ValidatingMessageProcessor {
    fn default() -> Self {
        Self::new(SchemaRegistry::v1())
    }
}

impl ValidatingMessageProcessor {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self {
            inner: Arc::new(Inner {
                schemas,
                handlers: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn handler_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.handlers.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl MessageProcessor for ValidatingMessageProcessor {
    fn register_handler(&self, key: &str, handler: Arc<dyn MessageHandler>) {
        if self
            .inner
            .handlers
            .write()
            .insert(key.to_string(), handler)
            .is_some()
        {
            debug!(%key, "replaced message handler");
        }
    }

    fn process_message(&self, raw: String) -> BoxFuture<'static, Result<(), ProcessError>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let value = inner.schemas.validate_str(&raw)?;
            let key = handler_key(
                value["protocolVersion"].as_str().unwrap_or_default(),
                value["messageType"].as_str().unwrap_or_default(),
            );

            let handler = inner.handlers.read().get(&key).cloned();
            let Some(handler) = handler else {
                trace!(%key, "no handler registered");
                return Ok(());
            };

            let message: Message = serde_json::from_value(value)?;
            handler
                .handle(message)
                .await
                .map_err(|source| ProcessError::Handler { key, source })
        })
    }
}
