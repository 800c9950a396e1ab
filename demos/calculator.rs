//! Per-id calculator served over named pipes.
//!
//! Each calculator instance gets an id from the server (`n`) and keeps one
//! running value there. Run with:
//!
//! ```text
//! RUST_LOG=pipe_rpc=debug cargo run --example calculator
//! ```

use pipe_rpc::{Registry, RpcClient, RpcConfig, RpcError, RpcServer, TransportPtr};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Operand {
    id: u64,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct Target {
    id: u64,
}

/// Server-side state: one running value per calculator id.
#[derive(Debug, Default)]
struct Memory {
    values: Mutex<HashMap<u64, f64>>,
    next_id: AtomicU64,
}

impl Memory {
    fn update(&self, op: Operand, apply: impl Fn(f64, f64) -> f64) -> pipe_rpc::Result<()> {
        // ---
        let mut values = self
            .values
            .lock()
            .map_err(|_| RpcError::Handler("calculator memory poisoned".into()))?;
        let slot = values.entry(op.id).or_default();
        *slot = apply(*slot, op.value);
        Ok(())
    }

    fn get(&self, id: u64) -> pipe_rpc::Result<f64> {
        // ---
        let values = self
            .values
            .lock()
            .map_err(|_| RpcError::Handler("calculator memory poisoned".into()))?;
        Ok(values.get(&id).copied().unwrap_or_default())
    }
}

fn calculator_registry(memory: Arc<Memory>) -> Registry {
    // ---
    let registry = Registry::new();

    let binary: [(&str, fn(f64, f64) -> f64); 5] = [
        ("+", |acc, v| acc + v),
        ("-", |acc, v| acc - v),
        ("*", |acc, v| acc * v),
        ("/", |acc, v| acc / v),
        ("=", |_, v| v),
    ];

    for (name, apply) in binary {
        let memory = memory.clone();
        registry.add(name, move |payload| {
            let op: Operand = serde_json::from_value(payload)?;
            memory.update(op, apply)?;
            Ok(None)
        });
    }

    {
        let memory = memory.clone();
        registry.add_typed("?", move |target: Target| memory.get(target.id));
    }

    registry.add("n", move |_| Ok(Some(json!(memory.next_id.fetch_add(1, Ordering::Relaxed)))));

    registry
}

/// Client-side handle on one calculator instance.
struct Calc {
    id: u64,
    client: RpcClient,
}

impl Calc {
    async fn new(client: RpcClient) -> anyhow::Result<Self> {
        // ---
        let id = client
            .call_typed::<_, u64>("n", &json!({}))
            .await?
            .ok_or_else(|| anyhow::anyhow!("server handed out no id"))?;
        Ok(Self { id, client })
    }

    async fn apply(&self, op: &str, value: f64) -> anyhow::Result<()> {
        // ---
        self.client
            .call(op, json!({ "id": self.id, "value": value }))
            .await?;
        Ok(())
    }

    async fn get(&self) -> anyhow::Result<f64> {
        // ---
        let value = self
            .client
            .call_typed::<_, f64>("?", &json!({ "id": self.id }))
            .await?;
        Ok(value.unwrap_or_default())
    }
}

#[cfg(unix)]
fn transport(config: &RpcConfig) -> TransportPtr {
    pipe_rpc::create_fifo_transport(config)
}

#[cfg(not(unix))]
fn transport(config: &RpcConfig) -> TransportPtr {
    pipe_rpc::create_memory_transport(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = tempfile::tempdir()?;
    let requests = dir.path().join("calculator.requests");
    let config = RpcConfig::new(requests.to_string_lossy().into_owned()).with_reply_dir(dir.path());
    let transport = transport(&config);

    let server = RpcServer::new(transport.clone(), &config).await?;
    server.bind(calculator_registry(Arc::new(Memory::default()))).await?;

    let client = RpcClient::new(transport, &config).await?;
    let first = Calc::new(client.clone()).await?;
    let second = Calc::new(client.clone()).await?;

    first.apply("=", 4.0).await?;
    first.apply("+", 1.0).await?;

    second.apply("=", 10.0).await?;
    second.apply("/", 4.0).await?;

    println!("calc {}: {}", first.id, first.get().await?);
    println!("calc {}: {}", second.id, second.get().await?);

    client.close().await?;
    server.shutdown().await?;
    Ok(())
}
