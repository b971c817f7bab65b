//! Request/reply calls over the transport.
//!
//! Every call publishes its payload tagged with a fresh correlation id and
//! the gateway's private reply queue, then waits for the reply carrying that
//! id. One listener task drains the reply queue and completes the matching
//! pending call; replies for unknown ids (mismatched, or arriving after their
//! call timed out) are logged and dropped.

use crate::error::TransportError;
use crate::transport::{Consumer, Message, Transport};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How a call ended. A timeout is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcOutcome {
    Replied(Vec<u8>),
    TimedOut,
}

impl RpcOutcome {
    pub fn into_reply(self) -> Option<Vec<u8>> {
        match self {
            RpcOutcome::Replied(payload) => Some(payload),
            RpcOutcome::TimedOut => None,
        }
    }
}

type PendingCalls = DashMap<String, oneshot::Sender<Vec<u8>>>;

pub struct RpcGateway {
    transport: Arc<dyn Transport>,
    exchange: String,
    reply_queue: String,
    timeout: Duration,
    pending: Arc<PendingCalls>,
    listener: JoinHandle<()>,
}

impl RpcGateway {
    /// Declare a reply queue on `transport` and start listening on it.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        exchange: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let reply_queue = transport.declare_reply_queue().await?;
        let replies = transport.consume(&reply_queue).await?;
        let pending = Arc::new(PendingCalls::new());

        let listener = tokio::spawn(listen(
            Arc::clone(&transport),
            replies,
            Arc::clone(&pending),
        ));
        debug!(reply_queue = %reply_queue, "RPC gateway connected");

        Ok(Self {
            transport,
            exchange: exchange.into(),
            reply_queue,
            timeout,
            pending,
            listener,
        })
    }

    /// Call with the gateway's default timeout.
    pub async fn call(&self, routing_key: &str, payload: Vec<u8>) -> Result<RpcOutcome, TransportError> {
        self.call_with_timeout(routing_key, payload, self.timeout).await
    }

    pub async fn call_with_timeout(
        &self,
        routing_key: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<RpcOutcome, TransportError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id.clone(), tx);

        let message = Message::new(payload)
            .with_correlation_id(correlation_id.clone())
            .with_reply_to(self.reply_queue.clone());
        if let Err(e) = self.transport.publish(&self.exchange, routing_key, message).await {
            self.pending.remove(&correlation_id);
            return Err(e);
        }
        debug!(routing_key = %routing_key, correlation_id = %correlation_id, "RPC request published");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(RpcOutcome::Replied(reply)),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.remove(&correlation_id);
                debug!(
                    routing_key = %routing_key,
                    correlation_id = %correlation_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "RPC call timed out"
                );
                Ok(RpcOutcome::TimedOut)
            }
        }
    }

    /// Encode `request`, call, and decode the reply. `None` on timeout.
    pub async fn call_json<Req, Resp>(
        &self,
        routing_key: &str,
        request: &Req,
    ) -> Result<Option<Resp>, TransportError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;
        match self.call(routing_key, payload).await? {
            RpcOutcome::Replied(reply) => Ok(Some(serde_json::from_slice(&reply)?)),
            RpcOutcome::TimedOut => Ok(None),
        }
    }

    /// Publish without waiting for any reply.
    pub async fn notify<Req: Serialize + ?Sized>(
        &self,
        routing_key: &str,
        request: &Req,
    ) -> Result<(), TransportError> {
        self.transport
            .publish(&self.exchange, routing_key, Message::json(request)?)
            .await
    }

    /// Calls still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for RpcGateway {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(transport: Arc<dyn Transport>, mut replies: Consumer, pending: Arc<PendingCalls>) {
    while let Some(delivery) = replies.recv().await {
        if let Err(e) = transport.ack(delivery.tag).await {
            warn!(tag = delivery.tag, error = %e, "Failed to acknowledge reply");
        }

        let Some(correlation_id) = delivery.message.correlation_id else {
            warn!("Discarding reply without correlation id");
            continue;
        };

        match pending.remove(&correlation_id) {
            Some((_, slot)) => {
                if slot.send(delivery.message.payload).is_err() {
                    debug!(correlation_id = %correlation_id, "Caller stopped waiting for reply");
                }
            }
            None => warn!(
                correlation_id = %correlation_id,
                "Discarding reply with no pending call (mismatched or orphaned)"
            ),
        }
    }
    debug!("RPC reply queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryBroker;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn call_without_responder_times_out_after_deadline() {
        let broker = Arc::new(InMemoryBroker::new());
        let gateway = RpcGateway::connect(broker, "ex", Duration::from_secs(20))
            .await
            .unwrap();

        let started = Instant::now();
        let outcome = gateway.call("nobody.listens", b"{}".to_vec()).await.unwrap();
        assert_eq!(outcome, RpcOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert_eq!(gateway.in_flight(), 0);
    }

    #[tokio::test]
    async fn matching_reply_completes_call() {
        let broker = Arc::new(InMemoryBroker::new());
        broker
            .declare_queue("ex", "echo", &["echo".to_string()])
            .await
            .unwrap();
        let mut requests = broker.consume("echo").await.unwrap();
        let gateway = RpcGateway::connect(broker.clone(), "ex", Duration::from_secs(5))
            .await
            .unwrap();

        let responder = {
            let broker = broker.clone();
            tokio::spawn(async move {
                let request = requests.recv().await.unwrap();
                broker.ack(request.tag).await.unwrap();
                let reply = Message::new(request.message.payload)
                    .with_correlation_id(request.message.correlation_id.unwrap());
                broker
                    .publish("", &request.message.reply_to.unwrap(), reply)
                    .await
                    .unwrap();
            })
        };

        let reply: Option<serde_json::Value> = gateway
            .call_json("echo", &serde_json::json!({"ping": 1}))
            .await
            .unwrap();
        assert_eq!(reply, Some(serde_json::json!({"ping": 1})));
        responder.await.unwrap();
    }
}
