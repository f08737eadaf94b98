//! The node composition root.
//!
//! [`Node`] owns the event bus, the shutdown controller, the DA backend and
//! the RPC client, and wires the externally supplied capabilities (mempool,
//! gossip, block store, indexer, application) into them. The block executor
//! publishes inclusion events through [`Node::bus`].

use std::net::SocketAddr;
use std::sync::Arc;

use tessel_da::{DataAvailabilityLayer, Registry};
use tessel_pubsub::EventBus;
use tessel_rpc::{Capabilities, Client, RpcError, RpcServer, ShutdownController, ShutdownSignal};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::NodeError;

pub struct Node {
    config: NodeConfig,
    bus: Arc<EventBus>,
    shutdown: ShutdownController,
    client: Arc<Client>,
    da: Box<dyn DataAvailabilityLayer>,
    server: Option<JoinHandle<Result<(), RpcError>>>,
    rpc_addr: Option<SocketAddr>,
    running: bool,
}

impl Node {
    /// Build a node. The DA backend named in the config is resolved from
    /// `registry` and initialised, but nothing is started yet.
    pub fn new(
        config: NodeConfig,
        caps: Capabilities,
        registry: &Registry,
    ) -> Result<Self, NodeError> {
        let mut da = registry.resolve(&config.da.layer)?;
        da.init(config.da.config.as_bytes())?;

        let bus = Arc::new(EventBus::new());
        let shutdown = ShutdownController::new();
        let client = Arc::new(Client::new(
            caps,
            bus.clone(),
            &config.rpc,
            shutdown.signal(),
        ));

        Ok(Self {
            config,
            bus,
            shutdown,
            client,
            da,
            server: None,
            rpc_addr: None,
            running: false,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }

    /// The event bus, for publishing block and transaction events.
    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn da(&self) -> &dyn DataAvailabilityLayer {
        self.da.as_ref()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Address the JSON-RPC server is bound to, when it is enabled and
    /// running.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.running {
            return Err(NodeError::AlreadyRunning);
        }
        info!(
            da_layer = self.da.name(),
            http = self.config.rpc.enable_http,
            "Tessel node starting"
        );

        self.da.start().await?;

        if self.config.rpc.enable_http {
            let server = RpcServer::bind(
                &self.config.rpc.laddr,
                self.client.clone(),
                self.shutdown.signal(),
            )
            .await?;
            self.rpc_addr = Some(server.local_addr()?);
            self.server = Some(tokio::spawn(server.run()));
        }

        self.running = true;
        info!(rpc_addr = ?self.rpc_addr, "Tessel node started");
        Ok(())
    }

    /// Start, then run until SIGINT/SIGTERM or a programmatic shutdown.
    pub async fn run_until_stopped(&mut self) -> Result<(), NodeError> {
        self.start().await?;
        let signal = self.shutdown.signal();
        tokio::select! {
            _ = self.shutdown.wait_for_signal() => {}
            _ = signal.wait() => {}
        }
        self.stop().await
    }

    /// Stop every subsystem. Pending commit waits resolve as cancelled and
    /// subscription forwarders exit.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        info!("Tessel node stopping");
        self.shutdown.shutdown();
        self.bus.stop();

        let server_result = match self.server.take() {
            Some(handle) => match handle.await {
                Ok(result) => result.map_err(NodeError::from),
                Err(e) => Err(NodeError::ServerTask(e.to_string())),
            },
            None => Ok(()),
        };
        self.rpc_addr = None;

        if let Err(err) = self.da.stop().await {
            warn!(%err, "failed to stop DA backend");
        }
        self.running = false;
        info!("Tessel node stopped");
        server_result
    }
}
