//! Binds request queues to handlers.
//!
//! Each [`Binding`] gets its own worker task that takes one delivery at a
//! time: decode, handle, publish the reply to the message's reply-to queue
//! with its correlation id, then acknowledge. Workers of different bindings
//! run concurrently. Nothing a handler does (a decode failure, a panic) stops
//! its worker; such messages are still acknowledged and, when the sender
//! waits for a reply, answered with a failed result.

use crate::error::{DispatchError, TransportError};
use crate::model::ValidationResult;
use crate::transport::{Consumer, Delivery, Message, Transport, DIRECT_EXCHANGE};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reply payload of a handled message; `None` when the kind has no reply.
pub type HandlerResult = Result<Option<Vec<u8>>, DispatchError>;
pub type Handler = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap a typed request/reply operation as a JSON handler.
pub fn json_handler<Req, Resp, F, Fut>(operation: F) -> Handler
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Resp> + Send + 'static,
{
    let operation = Arc::new(operation);
    Arc::new(move |payload: Vec<u8>| {
        let operation = Arc::clone(&operation);
        async move {
            let request: Req = serde_json::from_slice(&payload).map_err(DispatchError::Decode)?;
            let reply = operation(request).await;
            serde_json::to_vec(&reply)
                .map(Some)
                .map_err(DispatchError::Encode)
        }
        .boxed()
    })
}

/// Wrap a typed operation that never replies.
pub fn json_sink<Req, F, Fut>(operation: F) -> Handler
where
    Req: DeserializeOwned + Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let operation = Arc::new(operation);
    Arc::new(move |payload: Vec<u8>| {
        let operation = Arc::clone(&operation);
        async move {
            let request: Req = serde_json::from_slice(&payload).map_err(DispatchError::Decode)?;
            operation(request).await;
            Ok(None)
        }
        .boxed()
    })
}

pub struct Binding {
    pub queue: String,
    pub routing_key: String,
    pub handler: Handler,
}

impl Binding {
    pub fn new(queue: impl Into<String>, routing_key: impl Into<String>, handler: Handler) -> Self {
        Self {
            queue: queue.into(),
            routing_key: routing_key.into(),
            handler,
        }
    }
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    exchange: String,
    bindings: Vec<Binding>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, exchange: impl Into<String>) -> Self {
        Self {
            transport,
            exchange: exchange.into(),
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Declare every queue and start one worker per binding.
    ///
    /// All queues are declared and consumed before any worker starts, so a
    /// transport failure leaves nothing running.
    pub async fn spawn(self) -> Result<DispatcherHandle, TransportError> {
        let mut consumers = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings {
            self.transport
                .declare_queue(
                    &self.exchange,
                    &binding.queue,
                    std::slice::from_ref(&binding.routing_key),
                )
                .await?;
            let consumer = self.transport.consume(&binding.queue).await?;
            consumers.push((binding, consumer));
        }

        let token = CancellationToken::new();
        let workers = consumers
            .into_iter()
            .map(|(binding, consumer)| {
                info!(queue = %binding.queue, routing_key = %binding.routing_key, "Worker started");
                tokio::spawn(run_worker(
                    Arc::clone(&self.transport),
                    binding,
                    consumer,
                    token.clone(),
                ))
            })
            .collect();

        Ok(DispatcherHandle { token, workers })
    }
}

/// Running workers. Dropping the handle leaves them running.
pub struct DispatcherHandle {
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop every worker after its current message and wait for them.
    pub async fn shutdown(self) {
        self.token.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Worker ended abnormally");
            }
        }
        info!("Dispatcher stopped");
    }
}

async fn run_worker(
    transport: Arc<dyn Transport>,
    binding: Binding,
    mut consumer: Consumer,
    token: CancellationToken,
) {
    loop {
        let delivery = tokio::select! {
            _ = token.cancelled() => break,
            delivery = consumer.recv() => match delivery {
                Some(delivery) => delivery,
                None => {
                    warn!(queue = %binding.queue, "Consumer closed by transport");
                    break;
                }
            },
        };
        handle_delivery(transport.as_ref(), &binding, delivery).await;
    }
    debug!(queue = %binding.queue, "Worker stopped");
}

async fn handle_delivery(transport: &dyn Transport, binding: &Binding, delivery: Delivery) {
    let Delivery { tag, routing_key, message } = delivery;
    let correlation_id = message.correlation_id.clone();
    debug!(queue = %binding.queue, routing_key = %routing_key, correlation_id = ?correlation_id, "Message received");

    let outcome = AssertUnwindSafe((binding.handler)(message.payload))
        .catch_unwind()
        .await;

    let reply = match outcome {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            warn!(queue = %binding.queue, correlation_id = ?correlation_id, error = %e, "Request could not be handled");
            failure_reply(&e.to_string())
        }
        Err(_) => {
            error!(queue = %binding.queue, correlation_id = ?correlation_id, "Handler panicked");
            failure_reply("Internal error while handling request")
        }
    };

    if let Some(payload) = reply {
        match message.reply_to {
            Some(reply_to) => {
                let mut reply = Message::new(payload);
                reply.correlation_id = correlation_id.clone();
                if let Err(e) = transport.publish(DIRECT_EXCHANGE, &reply_to, reply).await {
                    warn!(reply_to = %reply_to, correlation_id = ?correlation_id, error = %e, "Failed to publish reply");
                }
            }
            None => debug!(queue = %binding.queue, "No reply destination, reply dropped"),
        }
    }

    if let Err(e) = transport.ack(tag).await {
        warn!(tag, error = %e, "Failed to acknowledge message");
    }
}

fn failure_reply(message: &str) -> Option<Vec<u8>> {
    let result = ValidationResult::<serde_json::Value>::failure(message);
    serde_json::to_vec(&result).ok()
}
