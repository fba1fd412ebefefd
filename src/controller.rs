//! Owns every router and applies topology changes to both ends of a link.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::logging::{LogEvent, LogSink};
use crate::network::Fabric;
use crate::router::Router;
use crate::types::{Algorithm, RouterInfo, RouterState};
use crate::{Cost, PortId};

pub struct RouterController {
    config: RouterConfig,
    routers: BTreeMap<PortId, Router>,
    next_port: PortId,
    fabric: Arc<Fabric>,
    log_tx: broadcast::Sender<LogEvent>,
}

impl RouterController {
    /// Fails if `config` does not pass [`RouterConfig::validate`].
    pub fn new(config: RouterConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let (log_tx, _) = broadcast::channel(config.log_capacity);
        Ok(Self {
            next_port: config.first_port,
            config,
            routers: BTreeMap::new(),
            fabric: Fabric::new(),
            log_tx,
        })
    }

    /// Log events from every router, unfiltered.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.log_tx.subscribe()
    }

    pub fn router_ids(&self) -> Vec<PortId> {
        self.routers.keys().copied().collect()
    }

    pub async fn create_router(&mut self) -> Result<PortId> {
        self.create_router_with(self.config.algorithm).await
    }

    /// Allocates a fresh identifier, runs a router under it and registers it.
    /// The identifier is consumed even if the router fails to start.
    pub async fn create_router_with(&mut self, algorithm: Algorithm) -> Result<PortId> {
        let port = self.next_port;
        self.next_port += 1;

        let log = LogSink::new(port, self.log_tx.clone());
        let mut router = Router::new(port, algorithm, &self.config, self.fabric.clone(), log);
        router.run().await?;
        self.routers.insert(port, router);
        info!(router = port, %algorithm, "router created");
        Ok(port)
    }

    pub async fn create_link(&mut self, id1: PortId, id2: PortId, cost: Cost) -> Result<()> {
        if id1 == id2 {
            return Err(RouterError::SelfLink(id1));
        }
        if cost == 0 {
            return Err(RouterError::InvalidCost(cost));
        }
        self.router(id1)?;
        self.router(id2)?;

        self.router(id1)?.connect(id2, cost).await?;
        self.router(id2)?.connect(id1, cost).await?;
        info!("link {}-{} created with cost {}", id1, id2, cost);
        Ok(())
    }

    pub async fn delete_link(&mut self, id1: PortId, id2: PortId) -> Result<()> {
        let linked_one_way = self.router(id1)?.has_neighbor(id2).await;
        let linked_other_way = self.router(id2)?.has_neighbor(id1).await;
        if !linked_one_way && !linked_other_way {
            return Err(RouterError::NotNeighbor { port: id1, peer: id2 });
        }

        self.router(id1)?.disconnect(id2).await?;
        self.router(id2)?.disconnect(id1).await?;
        info!("link {}-{} deleted", id1, id2);
        Ok(())
    }

    pub async fn delete_edge(&mut self, id1: PortId, id2: PortId) -> Result<()> {
        self.delete_link(id1, id2).await
    }

    pub async fn change_link_cost(&mut self, id1: PortId, id2: PortId, cost: Cost) -> Result<()> {
        if cost == 0 {
            return Err(RouterError::InvalidCost(cost));
        }
        if !self.router(id1)?.has_neighbor(id2).await {
            return Err(RouterError::NotNeighbor { port: id1, peer: id2 });
        }
        if !self.router(id2)?.has_neighbor(id1).await {
            return Err(RouterError::NotNeighbor { port: id2, peer: id1 });
        }

        self.router(id1)?.change_link_cost(id2, cost).await?;
        self.router(id2)?.change_link_cost(id1, cost).await?;
        Ok(())
    }

    /// Shuts the router down and removes it from its neighbors' tables.
    /// The router keeps its own table for `turn_on_router`.
    pub async fn shutdown_router(&mut self, id: PortId) -> Result<()> {
        self.router_mut(id)?.shutdown().await?;
        self.detach_from_peers(id).await
    }

    /// Restores the remembered links on the peer side, then runs the router.
    pub async fn turn_on_router(&mut self, id: PortId) -> Result<()> {
        let router = self.router(id)?;
        let state = router.state().await;
        if state != RouterState::Off {
            return Err(RouterError::InvalidTransition { port: id, from: state, action: "run" });
        }
        let neighbors = router.neighbors().await;
        if let Some(missing) = neighbors.keys().find(|peer| !self.routers.contains_key(peer)) {
            return Err(RouterError::UnknownRouter(*missing));
        }

        for neighbor in neighbors.values() {
            self.router(neighbor.dest)?.connect(id, neighbor.cost).await?;
        }
        self.router_mut(id)?.run().await
    }

    pub async fn fail_router(&mut self, id: PortId) -> Result<()> {
        self.router_mut(id)?.fail().await
    }

    pub async fn recover_router(&mut self, id: PortId) -> Result<()> {
        self.router_mut(id)?.recover().await
    }

    /// Removes the router whatever its state, and purges it from every
    /// remaining neighbor table.
    pub async fn delete_router(&mut self, id: PortId) -> Result<()> {
        let router = self.router_mut(id)?;
        if router.state().await == RouterState::On {
            router.shutdown().await?;
        } else {
            router.halt().await;
        }
        self.detach_from_peers(id).await?;

        self.routers.remove(&id);
        for router in self.routers.values() {
            if router.has_neighbor(id).await {
                router.disconnect(id).await?;
            }
        }
        info!(router = id, "router deleted");
        Ok(())
    }

    pub async fn get_router_info(&self, id: PortId) -> Result<RouterInfo> {
        Ok(self.router(id)?.get_info().await)
    }

    pub async fn fetch_node_info(&self, id: PortId) -> Result<RouterInfo> {
        self.get_router_info(id).await
    }

    /// Originates a data packet at `sender` addressed to `receiver`.
    pub async fn communicate(&self, sender: PortId, text: &str, receiver: PortId) -> Result<()> {
        self.router(sender)?.send_message(receiver, text).await
    }

    /// Drops every router. Identifiers are not reused afterwards.
    pub async fn clear_routers(&mut self) {
        for router in self.routers.values_mut() {
            router.halt().await;
        }
        self.routers.clear();
        info!("all routers cleared");
    }

    async fn detach_from_peers(&self, id: PortId) -> Result<()> {
        let neighbors = self.router(id)?.neighbors().await;
        for peer in neighbors.keys() {
            match self.routers.get(peer) {
                Some(router) => router.disconnect(id).await?,
                None => warn!(router = id, "former neighbor {} is no longer registered", peer),
            }
        }
        Ok(())
    }

    fn router(&self, id: PortId) -> Result<&Router> {
        self.routers.get(&id).ok_or(RouterError::UnknownRouter(id))
    }

    fn router_mut(&mut self, id: PortId) -> Result<&mut Router> {
        self.routers.get_mut(&id).ok_or(RouterError::UnknownRouter(id))
    }
}
