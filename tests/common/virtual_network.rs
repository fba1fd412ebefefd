use std::collections::{BTreeMap, VecDeque};
use tokio::sync::broadcast;

use routesim::config::RouterConfig;
use routesim::logging::{LogEvent, LogSink};
use routesim::router::{Outbound, RouterCore};
use routesim::types::{Algorithm, RouteEntry, RouterState};
use routesim::{Cost, PortId};

/// Deterministic in-memory network of router engines. Datagrams are queued
/// and delivered one at a time until nothing is left in flight.
pub struct VirtualNetwork {
    pub routers: BTreeMap<PortId, RouterCore>,
    in_flight: VecDeque<(PortId, PortId, Vec<u8>)>,
    log_rx: broadcast::Receiver<LogEvent>,
    pub delivered: usize,
}

impl VirtualNetwork {
    pub fn create(
        algorithm: Algorithm,
        nodes: &[PortId],
        links: &[(PortId, PortId, Cost)],
    ) -> Self {
        let (log_tx, log_rx) = broadcast::channel(1 << 16);
        let config = RouterConfig::default();
        let routers = nodes
            .iter()
            .map(|&port| {
                let log = LogSink::new(port, log_tx.clone());
                (port, RouterCore::new(port, algorithm, &config, log))
            })
            .collect();
        let mut network = VirtualNetwork {
            routers,
            in_flight: VecDeque::new(),
            log_rx,
            delivered: 0,
        };
        // Wire everything while off, then bring the routers up
        for &(a, b, cost) in links {
            network.get_node(a).connect(b, cost).unwrap();
            network.get_node(b).connect(a, cost).unwrap();
        }
        for &port in nodes {
            let out = network.get_node(port).start().unwrap();
            network.enqueue(port, out);
        }
        network
    }

    pub fn get_node(&mut self, port: PortId) -> &mut RouterCore {
        self.routers
            .get_mut(&port)
            .unwrap_or_else(|| panic!("No node {port} found"))
    }

    pub fn enqueue(&mut self, from: PortId, out: Vec<Outbound>) {
        for Outbound { next_hop, packet } in out {
            self.in_flight.push_back((from, next_hop, packet.encode().unwrap()));
        }
    }

    /// Delivers queued datagrams until the network is quiet. Panics if it
    /// does not settle within `limit` deliveries.
    pub fn run_until_quiet(&mut self, limit: usize) {
        let mut steps = 0;
        while let Some((from, to, bytes)) = self.in_flight.pop_front() {
            steps += 1;
            assert!(steps <= limit, "network did not settle after {limit} deliveries");
            let Some(router) = self.routers.get_mut(&to) else {
                continue;
            };
            let out = router.handle_datagram(from, &bytes);
            self.delivered += 1;
            self.enqueue(to, out);
        }
    }

    pub fn converge(&mut self) {
        self.run_until_quiet(200_000);
    }

    /// Fires every router's periodic advertisement once.
    pub fn tick(&mut self) {
        let ports: Vec<PortId> = self.routers.keys().copied().collect();
        for port in ports {
            let out = self.get_node(port).advertise();
            self.enqueue(port, out);
        }
    }

    pub fn link(&mut self, a: PortId, b: PortId, cost: Cost) {
        let out = self.get_node(a).connect(b, cost).unwrap();
        self.enqueue(a, out);
        let out = self.get_node(b).connect(a, cost).unwrap();
        self.enqueue(b, out);
    }

    pub fn unlink(&mut self, a: PortId, b: PortId) {
        let out = self.get_node(a).disconnect(b).unwrap();
        self.enqueue(a, out);
        let out = self.get_node(b).disconnect(a).unwrap();
        self.enqueue(b, out);
    }

    pub fn update_edge(&mut self, a: PortId, b: PortId, cost: Cost) {
        let out = self.get_node(a).change_link_cost(b, cost).unwrap();
        self.enqueue(a, out);
        let out = self.get_node(b).change_link_cost(a, cost).unwrap();
        self.enqueue(b, out);
    }

    /// Same bookkeeping as the controller: stop, then peers drop the link.
    pub fn shutdown(&mut self, port: PortId) {
        self.get_node(port).stop().unwrap();
        let peers: Vec<PortId> = self.get_node(port).neighbors().keys().copied().collect();
        for peer in peers {
            let out = self.get_node(peer).disconnect(port).unwrap();
            self.enqueue(peer, out);
        }
    }

    pub fn turn_on(&mut self, port: PortId) {
        let neighbors: Vec<(PortId, Cost)> = self
            .get_node(port)
            .neighbors()
            .values()
            .map(|n| (n.dest, n.cost))
            .collect();
        for (peer, cost) in neighbors {
            let out = self.get_node(peer).connect(port, cost).unwrap();
            self.enqueue(peer, out);
        }
        let out = self.get_node(port).start().unwrap();
        self.enqueue(port, out);
    }

    pub fn send(&mut self, from: PortId, to: PortId, text: &str) {
        let out = self.get_node(from).send_message(to, text).unwrap();
        self.enqueue(from, out);
    }

    pub fn route(&self, at: PortId, dest: PortId) -> Option<RouteEntry> {
        self.routers[&at].routes().get_route(dest).copied()
    }

    pub fn get_next_hop(&self, at: PortId, dest: PortId) -> PortId {
        self.route(at, dest)
            .unwrap_or_else(|| panic!("No route found from {at} to {dest}"))
            .next_hop
            .unwrap_or(at)
    }

    pub fn get_metric_to(&self, at: PortId, dest: PortId) -> Cost {
        self.route(at, dest)
            .unwrap_or_else(|| panic!("No route found from {at} to {dest}"))
            .cost
    }

    pub fn state(&self, port: PortId) -> RouterState {
        self.routers[&port].state()
    }

    /// Log events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<LogEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.log_rx.try_recv() {
            events.push(event);
        }
        events
    }
}
