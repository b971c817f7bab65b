use semantic_manager::rpc::{RpcGateway, RpcOutcome};
use semantic_manager::transport::{InMemoryBroker, Message, Transport, DIRECT_EXCHANGE};
use std::sync::Arc;
use std::time::Duration;

async fn responder_queue(broker: &Arc<InMemoryBroker>, key: &str) -> semantic_manager::transport::Consumer {
    broker
        .declare_queue("semantic", key, &[key.to_string()])
        .await
        .unwrap();
    broker.consume(key).await.unwrap()
}

#[tokio::test]
async fn test_mismatched_reply_is_ignored() {
    let broker = Arc::new(InMemoryBroker::new());
    let mut requests = responder_queue(&broker, "location.lookup").await;
    let gateway = RpcGateway::connect(broker.clone(), "semantic", Duration::from_secs(5))
        .await
        .unwrap();

    let responder = {
        let broker = broker.clone();
        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            broker.ack(request.tag).await.unwrap();
            let reply_to = request.message.reply_to.unwrap();
            let correlation_id = request.message.correlation_id.unwrap();

            let stale = Message::new(b"\"stale\"".to_vec()).with_correlation_id("someone-else");
            broker.publish(DIRECT_EXCHANGE, &reply_to, stale).await.unwrap();

            let fresh = Message::new(b"\"fresh\"".to_vec()).with_correlation_id(correlation_id);
            broker.publish(DIRECT_EXCHANGE, &reply_to, fresh).await.unwrap();
        })
    };

    let outcome = gateway
        .call("location.lookup", b"{}".to_vec())
        .await
        .unwrap();
    assert_eq!(outcome, RpcOutcome::Replied(b"\"fresh\"".to_vec()), "Stale reply must not complete the call");
    responder.await.unwrap();
    assert_eq!(gateway.in_flight(), 0);
}

#[tokio::test]
async fn test_concurrent_calls_get_their_own_replies() {
    let broker = Arc::new(InMemoryBroker::new());
    let mut requests = responder_queue(&broker, "echo").await;
    let gateway = Arc::new(
        RpcGateway::connect(broker.clone(), "semantic", Duration::from_secs(5))
            .await
            .unwrap(),
    );

    // Answer in reverse order of arrival
    let responder = {
        let broker = broker.clone();
        tokio::spawn(async move {
            let mut received = Vec::new();
            for _ in 0..3 {
                let request = requests.recv().await.unwrap();
                broker.ack(request.tag).await.unwrap();
                received.push(request.message);
            }
            for message in received.into_iter().rev() {
                let reply = Message::new(message.payload)
                    .with_correlation_id(message.correlation_id.unwrap());
                broker
                    .publish(DIRECT_EXCHANGE, &message.reply_to.unwrap(), reply)
                    .await
                    .unwrap();
            }
        })
    };

    let calls: Vec<_> = (0..3)
        .map(|n| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                let reply: Option<u32> = gateway.call_json("echo", &n).await.unwrap();
                (n, reply)
            })
        })
        .collect();

    for call in calls {
        let (sent, reply) = call.await.unwrap();
        assert_eq!(reply, Some(sent));
    }
    responder.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_silent_responder_times_out() {
    let broker = Arc::new(InMemoryBroker::new());
    let _requests = responder_queue(&broker, "location.lookup").await;
    let gateway = RpcGateway::connect(broker.clone(), "semantic", Duration::from_secs(20))
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    let outcome = gateway
        .call("location.lookup", b"{}".to_vec())
        .await
        .unwrap();

    assert_eq!(outcome, RpcOutcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(gateway.in_flight(), 0, "Timed-out call must release its slot");
}
