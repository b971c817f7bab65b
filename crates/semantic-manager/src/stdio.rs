//! Line-oriented bridge from stdin/stdout onto the exchange.
//!
//! Each input line is `{"routingKey": "...", "payload": {...}}`. The payload
//! is sent as an RPC call and the reply is written as one output line; a
//! timed-out call prints `{"error": "no result"}`.

use crate::rpc::{RpcGateway, RpcOutcome};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeRequest {
    routing_key: String,
    payload: Value,
}

pub async fn run_stdio(gateway: &RpcGateway) -> anyhow::Result<()> {
    bridge(gateway, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve `input` until it ends.
pub async fn bridge<R, W>(gateway: &RpcGateway, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(input, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<BridgeRequest>(&line) {
            Ok(request) => forward(gateway, request).await,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed bridge request");
                json!({ "error": format!("malformed request: {}", e) })
            }
        };

        let mut text = serde_json::to_string(&response)?;
        text.push('\n');
        output.write_all(text.as_bytes()).await?;
        output.flush().await?;
    }

    debug!("Bridge input closed");
    Ok(())
}

async fn forward(gateway: &RpcGateway, request: BridgeRequest) -> Value {
    let payload = match serde_json::to_vec(&request.payload) {
        Ok(payload) => payload,
        Err(e) => return json!({ "error": e.to_string() }),
    };

    match gateway.call(&request.routing_key, payload).await {
        Ok(RpcOutcome::Replied(reply)) => serde_json::from_slice(&reply)
            .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&reply) })),
        Ok(RpcOutcome::TimedOut) => json!({ "error": "no result" }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}
