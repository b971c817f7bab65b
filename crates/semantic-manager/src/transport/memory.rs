use super::{Consumer, Delivery, Message, Transport, DIRECT_EXCHANGE};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

struct Queue {
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

struct QueueBinding {
    exchange: String,
    pattern: String,
    queue: String,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, Queue>,
    bindings: Vec<QueueBinding>,
    unacked: HashMap<u64, String>,
    next_tag: u64,
    closed: bool,
}

impl BrokerState {
    fn deliver(&mut self, queue: &str, routing_key: &str, message: Message) {
        let Some(target) = self.queues.get(queue) else {
            warn!(queue = %queue, "Dropping message for undeclared queue");
            return;
        };

        self.next_tag += 1;
        let tag = self.next_tag;
        let delivery = Delivery {
            tag,
            routing_key: routing_key.to_string(),
            message,
        };
        if target.sender.send(delivery).is_ok() {
            self.unacked.insert(tag, queue.to_string());
        } else {
            debug!(queue = %queue, "Queue consumer is gone, message dropped");
        }
    }
}

/// A process-local broker with AMQP topic-exchange routing.
///
/// Routing keys are dot-separated words; in binding patterns `*` matches
/// exactly one word and `#` matches zero or more.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery tags handed out but not yet acknowledged, sorted.
    pub async fn pending_acks(&self) -> Vec<u64> {
        let mut tags: Vec<u64> = self.state.lock().await.unacked.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Stop accepting work. Open consumers see their stream end.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.queues.clear();
        state.bindings.clear();
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn declare_queue(
        &self,
        exchange: &str,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }

        state.queues.entry(queue.to_string()).or_insert_with(Queue::new);
        for key in routing_keys {
            let exists = state
                .bindings
                .iter()
                .any(|b| b.exchange == exchange && b.queue == queue && b.pattern == *key);
            if !exists {
                state.bindings.push(QueueBinding {
                    exchange: exchange.to_string(),
                    pattern: key.clone(),
                    queue: queue.to_string(),
                });
            }
        }
        debug!(queue = %queue, exchange = %exchange, bindings = ?routing_keys, "Queue declared");
        Ok(())
    }

    async fn declare_reply_queue(&self) -> Result<String, TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }

        let name = format!("amq.gen-{}", uuid::Uuid::new_v4().simple());
        state.queues.insert(name.clone(), Queue::new());
        Ok(name)
    }

    async fn consume(&self, queue: &str) -> Result<Consumer, TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }

        let entry = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_string()))?;
        entry
            .receiver
            .take()
            .ok_or_else(|| TransportError::AlreadyConsumed(queue.to_string()))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }

        if exchange == DIRECT_EXCHANGE {
            state.deliver(routing_key, routing_key, message);
            return Ok(());
        }

        let mut targets: Vec<String> = Vec::new();
        for binding in &state.bindings {
            if binding.exchange == exchange
                && topic_matches(&binding.pattern, routing_key)
                && !targets.contains(&binding.queue)
            {
                targets.push(binding.queue.clone());
            }
        }

        if targets.is_empty() {
            debug!(exchange = %exchange, routing_key = %routing_key, "Message was unroutable");
        }
        for queue in targets {
            state.deliver(&queue, routing_key, message.clone());
        }
        Ok(())
    }

    async fn ack(&self, tag: u64) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state
            .unacked
            .remove(&tag)
            .map(|_| ())
            .ok_or(TransportError::UnknownDelivery(tag))
    }
}

/// Whether `routing_key` matches the topic binding `pattern`.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&first, key_rest)) => (word == "*" || word == first) && matches_words(rest, key_rest),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_wildcards() {
        assert!(topic_matches("model.register", "model.register"));
        assert!(!topic_matches("model.register", "model.modify"));
        assert!(topic_matches("model.*", "model.modify"));
        assert!(!topic_matches("model.*", "model"));
        assert!(!topic_matches("resource.*", "resource.translate.scoped"));
        assert!(topic_matches("resource.#", "resource.translate.scoped"));
        assert!(topic_matches("resource.#", "resource"));
        assert!(topic_matches("#", "anything.at.all"));
        assert!(topic_matches("*.validate", "platform.validate"));
    }

    #[tokio::test]
    async fn publish_routes_to_bound_queues_once() {
        let broker = InMemoryBroker::new();
        broker
            .declare_queue("ex", "models", &["model.*".to_string(), "model.register".to_string()])
            .await
            .unwrap();
        broker
            .declare_queue("ex", "everything", &["#".to_string()])
            .await
            .unwrap();
        let mut models = broker.consume("models").await.unwrap();
        let mut everything = broker.consume("everything").await.unwrap();

        broker
            .publish("ex", "model.register", Message::new(b"m".to_vec()))
            .await
            .unwrap();
        broker
            .publish("ex", "platform.validate", Message::new(b"p".to_vec()))
            .await
            .unwrap();

        let first = models.recv().await.unwrap();
        assert_eq!(first.message.payload, b"m");
        assert_eq!(first.routing_key, "model.register");
        assert!(models.try_recv().is_err());

        assert_eq!(everything.recv().await.unwrap().message.payload, b"m");
        assert_eq!(everything.recv().await.unwrap().message.payload, b"p");
        assert_eq!(broker.pending_acks().await.len(), 3);
    }

    #[tokio::test]
    async fn direct_exchange_targets_queue_by_name() {
        let broker = InMemoryBroker::new();
        let reply_queue = broker.declare_reply_queue().await.unwrap();
        let mut replies = broker.consume(&reply_queue).await.unwrap();

        broker
            .publish(
                DIRECT_EXCHANGE,
                &reply_queue,
                Message::new(b"r".to_vec()).with_correlation_id("c1"),
            )
            .await
            .unwrap();

        let delivery = replies.recv().await.unwrap();
        assert_eq!(delivery.message.correlation_id.as_deref(), Some("c1"));
        broker.ack(delivery.tag).await.unwrap();
        assert!(broker.pending_acks().await.is_empty());
        assert!(matches!(
            broker.ack(delivery.tag).await,
            Err(TransportError::UnknownDelivery(_))
        ));
    }

    #[tokio::test]
    async fn queue_has_a_single_consumer() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("ex", "q", &[]).await.unwrap();
        let _consumer = broker.consume("q").await.unwrap();
        assert!(matches!(
            broker.consume("q").await,
            Err(TransportError::AlreadyConsumed(_))
        ));
        assert!(matches!(
            broker.consume("missing").await,
            Err(TransportError::UnknownQueue(_))
        ));
    }

    #[tokio::test]
    async fn close_ends_consumers() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("ex", "q", &["a".to_string()]).await.unwrap();
        let mut consumer = broker.consume("q").await.unwrap();
        broker.close().await;
        assert!(consumer.recv().await.is_none());
        assert!(matches!(
            broker.publish("ex", "a", Message::default()).await,
            Err(TransportError::Closed)
        ));
    }
}
