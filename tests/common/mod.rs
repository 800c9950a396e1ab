// tests/common/mod.rs

#![allow(dead_code)]

use pipe_rpc::{
    //
    create_memory_transport,
    RpcClient,
    RpcConfig,
    RpcServer,
    TransportPtr,
};

/// A server and one client over a private memory hub.
pub struct Pair {
    pub config: RpcConfig,
    pub transport: TransportPtr,
    pub server: RpcServer,
    pub client: RpcClient,
}

pub async fn memory_pair(request_address: &str) -> Pair {
    // ---
    init_logging();

    let config = RpcConfig::new(request_address);
    let transport = create_memory_transport(&config);

    let server = RpcServer::new(transport.clone(), &config)
        .await
        .expect("server failed to claim request address");
    let client = RpcClient::new(transport.clone(), &config)
        .await
        .expect("client failed to claim reply address");

    Pair {
        config,
        transport,
        server,
        client,
    }
}

#[cfg(feature = "logging")]
mod imp {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}

#[cfg(not(feature = "logging"))]
mod imp {
    #[inline]
    pub fn init() {}
}

pub fn init_logging() {
    imp::init();
}
