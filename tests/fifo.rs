// tests/fifo.rs

#![cfg(unix)]

mod common;

use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use pipe_rpc::{
    //
    create_fifo_transport,
    Registry,
    RpcClient,
    RpcConfig,
    RpcServer,
};

const WAIT: Duration = Duration::from_secs(2);

fn config(dir: &Path) -> RpcConfig {
    // ---
    let requests = dir.join("requests");
    RpcConfig::new(requests.to_string_lossy().into_owned()).with_reply_dir(dir)
}

#[tokio::test]
async fn test_fifo_round_trip() -> anyhow::Result<()> {
    // ---
    common::init_logging();

    let dir = tempfile::tempdir()?;
    let config = config(dir.path());
    let transport = create_fifo_transport(&config);

    let server = RpcServer::new(transport.clone(), &config).await?;
    let registry = Registry::new();
    registry.add("double", |p| Ok(Some(json!(p["value"].as_i64().unwrap_or_default() * 2))));
    server.bind(registry).await?;

    let client = RpcClient::new(transport, &config).await?;
    assert!(client.reply_address().as_str().starts_with(&*dir.path().to_string_lossy()));
    assert!(Path::new(client.reply_address().as_str()).exists());

    let reply = timeout(WAIT, client.call("double", json!({"value": 21}))).await??;
    assert_eq!(reply, Some(json!(42)));

    let missing = timeout(WAIT, client.call("missing", json!(null))).await??;
    assert_eq!(missing, None);

    let reply_path = client.reply_address().to_string();
    client.close().await?;
    assert!(!Path::new(&reply_path).exists());

    server.shutdown().await?;
    assert!(!Path::new(&config.request_address).exists());
    Ok(())
}

#[tokio::test]
async fn test_fifo_server_reclaims_stale_node() -> anyhow::Result<()> {
    // ---
    common::init_logging();

    let dir = tempfile::tempdir()?;
    let config = config(dir.path());
    let transport = create_fifo_transport(&config);

    // Leftover from a run that never cleaned up
    std::fs::write(&config.request_address, b"stale")?;

    let server = RpcServer::new(transport.clone(), &config).await?;
    server.bind(Registry::new()).await?;

    let client = RpcClient::new(transport, &config).await?;
    let reply = timeout(WAIT, client.call("anything", json!(1))).await??;
    assert_eq!(reply, None);
    Ok(())
}
