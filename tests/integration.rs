// tests/integration.rs

mod common;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use common::memory_pair;
use pipe_rpc::{
    //
    protocol::encode_frame,
    Address,
    Registry,
    RpcClient,
    RpcError,
};

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i64,
    b: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AddResponse {
    sum: i64,
}

fn math_registry() -> Registry {
    // ---
    let registry = Registry::new();
    registry.add("double", |payload: Value| {
        let value = payload["value"].as_i64().unwrap_or_default();
        Ok(Some(json!(value * 2)))
    });
    registry.add_typed("add", |req: AddRequest| Ok(AddResponse { sum: req.a + req.b }));
    registry.add("nothing", |_| Ok(Some(Value::Null)));
    registry.add("fail", |_| Err(RpcError::Handler("refused".into())));
    registry
}

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_double_and_missing() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_double_and_missing").await;
    pair.server.bind(math_registry()).await?;

    let doubled = timeout(WAIT, pair.client.call("double", json!({"value": 21}))).await??;
    assert_eq!(doubled, Some(json!(42)));

    let missing = timeout(WAIT, pair.client.call("missing", json!({}))).await??;
    assert_eq!(missing, None);

    pair.server.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_explicit_null_is_a_value() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_explicit_null_is_a_value").await;
    pair.server.bind(math_registry()).await?;

    let reply = timeout(WAIT, pair.client.call("nothing", json!(null))).await??;
    assert_eq!(reply, Some(Value::Null));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_typed_requests() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_concurrent_typed_requests").await;
    pair.server.bind(math_registry()).await?;

    let calls = (0..20).map(|i| {
        let client = pair.client.clone();
        async move {
            client
                .call_typed::<_, AddResponse>("add", &AddRequest { a: i, b: i })
                .await
        }
    });

    let results = timeout(WAIT, join_all(calls)).await?;
    for (i, result) in results.into_iter().enumerate() {
        let sum = result?.map(|resp| resp.sum);
        assert_eq!(sum, Some(2 * i as i64));
    }
    assert_eq!(pair.client.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_clients_are_isolated() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_clients_are_isolated").await;
    pair.server.bind(math_registry()).await?;

    let other = RpcClient::new(pair.transport.clone(), &pair.config).await?;
    assert_ne!(other.reply_address(), pair.client.reply_address());

    // Both clients use id 0 for their first request
    let mine = pair.client.request("double", json!({"value": 1})).await?;
    let theirs = other.request("double", json!({"value": 100})).await?;
    assert_eq!(mine.id(), theirs.id());

    assert_eq!(timeout(WAIT, mine).await??, Some(json!(2)));
    assert_eq!(timeout(WAIT, theirs).await??, Some(json!(200)));
    Ok(())
}

#[tokio::test]
async fn test_failing_handler_leaves_call_pending() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_failing_handler_leaves_call_pending").await;
    pair.server.bind(math_registry()).await?;

    let call = pair.client.request("fail", json!(null)).await?;
    assert!(timeout(Duration::from_millis(200), call).await.is_err());
    assert_eq!(pair.client.pending_count(), 1);

    // Later traffic is unaffected
    let reply = timeout(WAIT, pair.client.call("double", json!({"value": 4}))).await??;
    assert_eq!(reply, Some(json!(8)));
    Ok(())
}

#[tokio::test]
async fn test_malformed_requests_are_dropped() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_malformed_requests_are_dropped").await;
    pair.server.bind(math_registry()).await?;

    let server = Address::from("test_malformed_requests_are_dropped");
    let reply_to = pair.client.reply_address().to_string();

    // Not JSON, and a request without `op`
    pair.transport
        .send(&server, encode_frame(b"\x01garbage".to_vec()))
        .await?;
    let no_op = json!({"response_path": reply_to, "id": 0, "payload": {}});
    pair.transport
        .send(&server, encode_frame(serde_json::to_vec(&no_op)?))
        .await?;

    let reply = timeout(WAIT, pair.client.call("double", json!({"value": 5}))).await??;
    assert_eq!(reply, Some(json!(10)));
    Ok(())
}

#[tokio::test]
async fn test_rebind_waits_for_old_dispatches() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_rebind_waits_for_old_dispatches").await;

    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let old = Registry::new();
    {
        let started = started.clone();
        let finished = finished.clone();
        old.add("slow", move |_| {
            started.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(300));
            finished.store(true, Ordering::SeqCst);
            Ok(Some(json!("old")))
        });
    }
    pair.server.bind(old).await?;

    let slow = pair.client.request("slow", json!(null)).await?;

    timeout(WAIT, async {
        while pair.server.in_flight() == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    let new = Registry::new();
    new.add("slow", |_| Ok(Some(json!("new"))));
    pair.server.bind(new).await?;

    // Nothing from the old binding is still running
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(pair.server.in_flight(), 0);

    assert_eq!(timeout(WAIT, slow).await??, Some(json!("old")));

    let reply = timeout(WAIT, pair.client.call("slow", json!(null))).await??;
    assert_eq!(reply, Some(json!("new")));
    assert_eq!(started.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_unbind_then_bind_again() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_unbind_then_bind_again").await;
    pair.server.bind(math_registry()).await?;

    pair.server.unbind().await;
    let dropped = pair.client.request("double", json!({"value": 1})).await?;
    assert!(timeout(Duration::from_millis(200), dropped).await.is_err());

    pair.server.bind(math_registry()).await?;
    let reply = timeout(WAIT, pair.client.call("double", json!({"value": 3}))).await??;
    assert_eq!(reply, Some(json!(6)));
    Ok(())
}

#[tokio::test]
async fn test_shutdown_and_close() -> anyhow::Result<()> {
    // ---
    let pair = memory_pair("test_shutdown_and_close").await;
    pair.server.bind(math_registry()).await?;

    pair.server.shutdown().await?;
    let unsent = pair.client.request("double", json!({"value": 1})).await;
    assert!(matches!(unsent, Err(RpcError::Io(_))));
    assert_eq!(pair.client.pending_count(), 0);

    pair.client.close().await?;
    let closed = pair.client.request("double", json!({"value": 1})).await;
    assert!(matches!(closed, Err(RpcError::Closed)));
    Ok(())
}
