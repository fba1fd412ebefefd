//! Async router: binds a fabric endpoint, runs the receive loop and the
//! periodic advertisement timer around a [`RouterCore`].

pub mod engine;

pub use engine::{Outbound, RouterCore};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::logging::LogSink;
use crate::network::{Endpoint, Fabric, Inbox};
use crate::types::{Algorithm, NeighborTable, RouterInfo, RouterState};
use crate::{Cost, PortId};

pub struct Router {
    port: PortId,
    algorithm: Algorithm,
    core: Arc<Mutex<RouterCore>>,
    endpoint: Endpoint,
    advertise_interval: Duration,
    listen_handle: Option<JoinHandle<()>>,
    advertise_handle: Option<JoinHandle<()>>,
}

impl Router {
    pub fn new(
        port: PortId,
        algorithm: Algorithm,
        config: &RouterConfig,
        fabric: Arc<Fabric>,
        log: LogSink,
    ) -> Self {
        Self {
            port,
            algorithm,
            core: Arc::new(Mutex::new(RouterCore::new(port, algorithm, config, log))),
            endpoint: Endpoint::new(port, fabric),
            advertise_interval: config.advertise_interval(algorithm),
            listen_handle: None,
            advertise_handle: None,
        }
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub async fn state(&self) -> RouterState {
        self.core.lock().await.state()
    }

    pub async fn neighbors(&self) -> NeighborTable {
        self.core.lock().await.neighbors().clone()
    }

    pub async fn has_neighbor(&self, peer: PortId) -> bool {
        self.core.lock().await.has_neighbor(peer)
    }

    pub async fn get_info(&self) -> RouterInfo {
        self.core.lock().await.info()
    }

    /// Binds the endpoint and starts the protocol.
    pub async fn run(&mut self) -> Result<()> {
        let mut core = self.core.lock().await;
        if core.state() != RouterState::Off {
            return Err(RouterError::InvalidTransition {
                port: self.port,
                from: core.state(),
                action: "run",
            });
        }
        let inbox = self.endpoint.open()?;
        let out = match core.start() {
            Ok(out) => out,
            Err(e) => {
                self.endpoint.close();
                return Err(e);
            }
        };
        dispatch(&self.endpoint, out);
        drop(core);

        let listener = start_listen_task(self.core.clone(), self.endpoint.clone(), inbox);
        self.listen_handle = Some(listener);
        self.advertise_handle = Some(self.start_advertise_task());
        info!(router = self.port, algorithm = %self.algorithm, "router running");
        Ok(())
    }

    /// Stops the protocol and releases the endpoint. Neighbors are kept.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.core.lock().await.stop()?;
        self.stop_tasks();
        self.endpoint.close();
        info!(router = self.port, "router shut down");
        Ok(())
    }

    /// Simulated failure: the endpoint stays bound but nothing is processed.
    pub async fn fail(&mut self) -> Result<()> {
        self.core.lock().await.fail()?;
        if let Some(handle) = self.advertise_handle.take() {
            handle.abort();
        }
        Ok(())
    }

    pub async fn recover(&mut self) -> Result<()> {
        let out = self.core.lock().await.recover()?;
        dispatch(&self.endpoint, out);
        self.advertise_handle = Some(self.start_advertise_task());
        Ok(())
    }

    /// Forces the router off from any state.
    pub async fn halt(&mut self) {
        self.core.lock().await.halt();
        self.stop_tasks();
        self.endpoint.close();
    }

    pub async fn connect(&self, peer: PortId, cost: Cost) -> Result<()> {
        let out = self.core.lock().await.connect(peer, cost)?;
        dispatch(&self.endpoint, out);
        Ok(())
    }

    pub async fn disconnect(&self, peer: PortId) -> Result<()> {
        let out = self.core.lock().await.disconnect(peer)?;
        dispatch(&self.endpoint, out);
        Ok(())
    }

    pub async fn change_link_cost(&self, peer: PortId, cost: Cost) -> Result<()> {
        let out = self.core.lock().await.change_link_cost(peer, cost)?;
        dispatch(&self.endpoint, out);
        Ok(())
    }

    pub async fn send_message(&self, dest: PortId, text: &str) -> Result<()> {
        let out = self.core.lock().await.send_message(dest, text)?;
        dispatch(&self.endpoint, out);
        Ok(())
    }

    fn start_advertise_task(&self) -> JoinHandle<()> {
        let core = self.core.clone();
        let endpoint = self.endpoint.clone();
        let period = self.advertise_interval;
        tokio::spawn(async move {
            advertise_task(core, endpoint, period).await;
        })
    }

    fn stop_tasks(&mut self) {
        for handle in [self.listen_handle.take(), self.advertise_handle.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.stop_tasks();
        self.endpoint.close();
    }
}

fn start_listen_task(
    core: Arc<Mutex<RouterCore>>,
    endpoint: Endpoint,
    inbox: Inbox,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        listen_task(core, endpoint, inbox).await;
    })
}

async fn listen_task(core: Arc<Mutex<RouterCore>>, endpoint: Endpoint, mut inbox: Inbox) {
    while let Some(datagram) = inbox.recv().await {
        let out = core.lock().await.handle_datagram(datagram.from, &datagram.payload);
        dispatch(&endpoint, out);
    }
    debug!(router = endpoint.port(), "listen task finished");
}

async fn advertise_task(core: Arc<Mutex<RouterCore>>, endpoint: Endpoint, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; start already advertised
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let out = core.lock().await.advertise();
        debug!(router = endpoint.port(), packets = out.len(), "periodic advertisement");
        dispatch(&endpoint, out);
    }
}

fn dispatch(endpoint: &Endpoint, out: Vec<Outbound>) {
    for Outbound { next_hop, packet } in out {
        match packet.encode() {
            Ok(bytes) => endpoint.send_to(next_hop, bytes),
            Err(e) => {
                error!(router = endpoint.port(), "failed to encode packet for {}: {}", next_hop, e)
            }
        }
    }
}
