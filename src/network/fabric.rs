//! Simulated point-to-point datagram transport.
//!
//! Each router binds one endpoint under its port. Delivery is at-most-once:
//! datagrams addressed to an unbound port are discarded without error, and
//! senders never wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::PortId;
use crate::error::{Result, RouterError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Link-layer sender, i.e. the neighbor that put this on the wire
    pub from: PortId,
    pub payload: Vec<u8>,
}

pub type Inbox = mpsc::UnboundedReceiver<Datagram>;

#[derive(Debug, Default)]
pub struct Fabric {
    endpoints: Mutex<HashMap<PortId, mpsc::UnboundedSender<Datagram>>>,
}

impl Fabric {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens the endpoint for `port`. Fails if it is already open.
    pub fn bind(&self, port: PortId) -> Result<Inbox> {
        let mut endpoints = self.endpoints();
        if endpoints.get(&port).is_some_and(|tx| !tx.is_closed()) {
            return Err(RouterError::AddressInUse(port));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        endpoints.insert(port, tx);
        debug!(port, "endpoint bound");
        Ok(rx)
    }

    pub fn unbind(&self, port: PortId) {
        if self.endpoints().remove(&port).is_some() {
            debug!(port, "endpoint closed");
        }
    }

    /// Fire-and-forget send.
    pub fn send(&self, from: PortId, to: PortId, payload: Vec<u8>) {
        let endpoints = self.endpoints();
        match endpoints.get(&to) {
            Some(tx) => {
                if tx.send(Datagram { from, payload }).is_err() {
                    trace!(from, to, "receiver gone, datagram discarded");
                }
            }
            None => trace!(from, to, "no endpoint bound, datagram discarded"),
        }
    }

    fn endpoints(&self) -> MutexGuard<'_, HashMap<PortId, mpsc::UnboundedSender<Datagram>>> {
        // The map stays consistent even if a holder panicked
        self.endpoints.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sending half of a router's endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    port: PortId,
    fabric: Arc<Fabric>,
}

impl Endpoint {
    pub fn new(port: PortId, fabric: Arc<Fabric>) -> Self {
        Self { port, fabric }
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn open(&self) -> Result<Inbox> {
        self.fabric.bind(self.port)
    }

    pub fn close(&self) {
        self.fabric.unbind(self.port);
    }

    pub fn send_to(&self, to: PortId, payload: Vec<u8>) {
        self.fabric.send(self.port, to, payload);
    }
}
