//! Per-router protocol engine.
//!
//! `RouterCore` holds all of a router's state and never touches I/O: every
//! step returns the packets it wants sent and the caller puts them on the
//! wire. A step always runs to completion before the next one starts.

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, trace};

use crate::algorithms::{dijkstra, distance_vector};
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::logging::LogSink;
use crate::protocol::{sequence, LinkState, Packet, Payload, RoutingTable, SequenceLedger};
use crate::types::{
    AdjacencyList, Algorithm, DistanceVector, Neighbor, NeighborTable, RouterInfo, RouterState,
};
use crate::{Cost, PortId};

/// A packet to hand to the directly connected router `next_hop`.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub next_hop: PortId,
    pub packet: Packet,
}

#[derive(Debug)]
pub struct RouterCore {
    port: PortId,
    algorithm: Algorithm,
    state: RouterState,
    neighbors: NeighborTable,

    // Derived state, rebuilt on every run
    adjacency: AdjacencyList,
    link_states: BTreeMap<PortId, LinkState>,
    ledger: SequenceLedger,
    neighbor_dvs: BTreeMap<PortId, DistanceVector>,
    routes: RoutingTable,
    awaiting_sync: BTreeSet<PortId>,

    // Survives restarts so peers never see our sequence go backwards
    next_sequence: u32,
    sequence_modulus: u32,
    dv_infinity: Cost,
    log: LogSink,
}

impl RouterCore {
    pub fn new(port: PortId, algorithm: Algorithm, config: &RouterConfig, log: LogSink) -> Self {
        Self {
            port,
            algorithm,
            state: RouterState::Off,
            neighbors: NeighborTable::new(),
            adjacency: AdjacencyList::new(),
            link_states: BTreeMap::new(),
            ledger: SequenceLedger::new(config.sequence_wrap_threshold),
            neighbor_dvs: BTreeMap::new(),
            routes: RoutingTable::new(),
            awaiting_sync: BTreeSet::new(),
            next_sequence: 0,
            sequence_modulus: config.sequence_modulus,
            dv_infinity: config.dv_infinity,
            log,
        }
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn has_neighbor(&self, peer: PortId) -> bool {
        self.neighbors.contains_key(&peer)
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn adjacency(&self) -> &AdjacencyList {
        &self.adjacency
    }

    pub fn neighbor_dvs(&self) -> &BTreeMap<PortId, DistanceVector> {
        &self.neighbor_dvs
    }

    pub fn info(&self) -> RouterInfo {
        RouterInfo {
            port: self.port,
            algorithm: self.algorithm,
            state: self.state,
            neighbors: self.neighbors.clone(),
            adjacency_list: self.adjacency.clone(),
            neighbor_dvs: self.neighbor_dvs.clone(),
            route_table: self.routes.to_map(),
        }
    }

    // -------------------------------------------------------------- lifecycle

    /// off -> on. Clears derived state and seeds the algorithm from the
    /// preserved neighbor table.
    pub fn start(&mut self) -> Result<Vec<Outbound>> {
        self.expect_state(RouterState::Off, "run")?;
        self.state = RouterState::On;
        self.clear_derived();
        self.log.push("start running");
        self.react_to_neighbors()
    }

    /// on -> off. The neighbor table is kept for a later restart.
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(RouterState::On, "shut down")?;
        self.state = RouterState::Off;
        self.clear_derived();
        self.log.push("shutdown");
        Ok(())
    }

    /// on -> fault. State is frozen and nothing is sent or processed.
    pub fn fail(&mut self) -> Result<()> {
        self.expect_state(RouterState::On, "fail")?;
        self.state = RouterState::Fault;
        self.log.push("router break down");
        Ok(())
    }

    /// fault -> on, keeping derived state.
    pub fn recover(&mut self) -> Result<Vec<Outbound>> {
        self.expect_state(RouterState::Fault, "recover")?;
        self.state = RouterState::On;
        self.log.push("router recover");
        // The neighbor table may have changed while faulted
        self.react_to_neighbors()
    }

    /// Forces the router off from any state.
    pub fn halt(&mut self) {
        if self.state != RouterState::Off {
            self.state = RouterState::Off;
            self.clear_derived();
            self.log.push("halted");
        }
    }

    fn expect_state(&self, expected: RouterState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RouterError::InvalidTransition {
                port: self.port,
                from: self.state,
                action,
            })
        }
    }

    fn clear_derived(&mut self) {
        self.adjacency.clear();
        self.link_states.clear();
        self.ledger.clear();
        self.neighbor_dvs.clear();
        self.routes.clear();
        self.awaiting_sync.clear();
    }

    // ---------------------------------------------------------- neighbor table

    pub fn connect(&mut self, peer: PortId, cost: Cost) -> Result<Vec<Outbound>> {
        if cost == 0 {
            return Err(RouterError::InvalidCost(cost));
        }
        if peer == self.port {
            return Err(RouterError::SelfLink(peer));
        }
        if self.neighbors.contains_key(&peer) {
            self.log.warn(format!("{peer} is already a neighbor, connect ignored"));
            return Ok(Vec::new());
        }
        self.neighbors.insert(peer, Neighbor { dest: peer, cost });
        self.awaiting_sync.insert(peer);
        self.log.push(format!("connect with {peer}"));
        self.react_to_neighbors()
    }

    pub fn disconnect(&mut self, peer: PortId) -> Result<Vec<Outbound>> {
        if self.neighbors.remove(&peer).is_none() {
            self.log.warn(format!("{peer} is not a neighbor, disconnect ignored"));
            return Ok(Vec::new());
        }
        self.awaiting_sync.remove(&peer);
        self.log.push(format!("disconnect with {peer}"));
        self.react_to_neighbors()
    }

    pub fn change_link_cost(&mut self, peer: PortId, cost: Cost) -> Result<Vec<Outbound>> {
        if cost == 0 {
            return Err(RouterError::InvalidCost(cost));
        }
        let port = self.port;
        let neighbor = self
            .neighbors
            .get_mut(&peer)
            .ok_or(RouterError::NotNeighbor { port, peer })?;
        let old = neighbor.cost;
        neighbor.cost = cost;
        self.log.push(format!("changing link cost with {peer}: from {old} to {cost}"));
        self.react_to_neighbors()
    }

    /// Re-evaluates after a neighbor-table change. Off and faulted routers
    /// defer this to `start`/`recover`.
    fn react_to_neighbors(&mut self) -> Result<Vec<Outbound>> {
        if self.state != RouterState::On {
            return Ok(Vec::new());
        }
        match self.algorithm {
            Algorithm::LinkState => {
                self.adjacency.insert(self.port, self.neighbors.clone());
                // Each neighbor is assumed to see us back until it says otherwise
                for neighbor in self.neighbors.values() {
                    self.adjacency.entry(neighbor.dest).or_default().insert(
                        self.port,
                        Neighbor { dest: self.port, cost: neighbor.cost },
                    );
                }
                self.recompute_link_state()?;
                Ok(self.originate_link_state(None))
            }
            Algorithm::DistanceVector => {
                let neighbors = &self.neighbors;
                self.neighbor_dvs.retain(|peer, _| neighbors.contains_key(peer));
                for &peer in self.neighbors.keys() {
                    self.neighbor_dvs
                        .entry(peer)
                        .or_insert_with(|| distance_vector::seed_vector(peer));
                }
                if self.recompute_distance_vector()? {
                    Ok(self.distance_vector_advertisements())
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    // ------------------------------------------------------------------- data

    pub fn send_message(&mut self, dest: PortId, text: &str) -> Result<Vec<Outbound>> {
        if self.state != RouterState::On {
            return Err(RouterError::NotRunning(self.port));
        }
        self.log.push(format!("sending message \"{text}\" to {dest}"));
        Ok(self.deliver_or_forward(Packet::data(self.port, dest, text)))
    }

    fn deliver_or_forward(&mut self, packet: Packet) -> Vec<Outbound> {
        if packet.dest == self.port {
            if let Payload::Data(text) = &packet.body {
                self.log.push_with(format!("receive message for me: {text}"), &packet);
            }
            return Vec::new();
        }
        match self.routes.next_hop(packet.dest) {
            Some(next_hop) => {
                self.log.push_with(format!("forward packet to {next_hop}"), &packet);
                vec![Outbound { next_hop, packet }]
            }
            None => {
                self.log.warn_with("don't know where to forward the packet", &packet);
                Vec::new()
            }
        }
    }

    // ---------------------------------------------------------------- receive

    /// Periodic re-advertisement. Nothing is sent unless the router is on.
    pub fn advertise(&mut self) -> Vec<Outbound> {
        if self.state != RouterState::On {
            return Vec::new();
        }
        match self.algorithm {
            Algorithm::LinkState => self.originate_link_state(None),
            Algorithm::DistanceVector => self.distance_vector_advertisements(),
        }
    }

    /// Handles one datagram received from the directly connected `from`.
    pub fn handle_datagram(&mut self, from: PortId, bytes: &[u8]) -> Vec<Outbound> {
        if self.state != RouterState::On {
            trace!(router = self.port, from, "dropping datagram while {}", self.state);
            return Vec::new();
        }
        if !self.neighbors.contains_key(&from) {
            self.log.warn(format!("received packet from {from}, which is not a neighbor"));
            return Vec::new();
        }
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.log.warn(format!("malformed packet from {from}: {e}"));
                return Vec::new();
            }
        };

        let result = match (&packet.body, self.algorithm) {
            (Payload::LinkState(state), Algorithm::LinkState) => {
                let state = state.clone();
                self.on_link_state(from, &packet, state)
            }
            (Payload::DistanceVector(items), Algorithm::DistanceVector) => {
                let vector = items.iter().map(|item| (item.dest, item.cost)).collect();
                self.on_distance_vector(from, vector)
            }
            (Payload::Data(_), _) => Ok(self.deliver_or_forward(packet.clone())),
            _ => {
                self.log.warn(format!(
                    "unexpected {} packet from {from} on a {} router",
                    packet.protocol(),
                    self.algorithm
                ));
                Ok(Vec::new())
            }
        };

        result.unwrap_or_else(|e| {
            error!(router = self.port, "failed to process packet from {}: {}", from, e);
            Vec::new()
        })
    }

    // ------------------------------------------------------------- link-state

    fn on_link_state(
        &mut self,
        from: PortId,
        packet: &Packet,
        state: LinkState,
    ) -> Result<Vec<Outbound>> {
        let origin = packet.src;
        if origin == self.port {
            trace!(router = self.port, "own advertisement came back");
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        if origin == from && self.awaiting_sync.remove(&from) {
            debug!(router = self.port, peer = from, "sending link-state database");
            out.extend(self.link_state_database_for(from));
        }

        if !self.ledger.accept(origin, state.sequence_number) {
            trace!(router = self.port, origin, seq = state.sequence_number, "stale advertisement");
            return Ok(out);
        }

        for &peer in self.neighbors.keys() {
            if peer != from {
                out.push(Outbound { next_hop: peer, packet: packet.clone() });
            }
        }

        let advertised: NeighborTable = state
            .neighbors
            .iter()
            .map(|neighbor| (neighbor.dest, *neighbor))
            .collect();
        if self.adjacency.get(&origin) != Some(&advertised) {
            self.log.push_with(
                format!("receive new link state of {origin}"),
                &json!({ "old": self.adjacency.get(&origin), "new": &state.neighbors }),
            );
            self.adjacency.insert(origin, advertised);
            self.recompute_link_state()?;
        }
        self.link_states.insert(origin, state);
        Ok(out)
    }

    fn recompute_link_state(&mut self) -> Result<bool> {
        let table = dijkstra::calculate_shortest_paths(&self.adjacency, self.port)?;
        Ok(self.install(table))
    }

    /// Fresh self-originated advertisement, to every neighbor or just `only`.
    fn originate_link_state(&mut self, only: Option<PortId>) -> Vec<Outbound> {
        let state = LinkState {
            neighbors: self.neighbors.values().copied().collect(),
            sequence_number: sequence::next(&mut self.next_sequence, self.sequence_modulus),
        };
        self.neighbors
            .keys()
            .filter(|&&peer| only.is_none_or(|target| target == peer))
            .map(|&peer| Outbound {
                next_hop: peer,
                packet: Packet::link_state(self.port, peer, state.clone()),
            })
            .collect()
    }

    /// Everything we know, for a neighbor that just came up.
    fn link_state_database_for(&mut self, peer: PortId) -> Vec<Outbound> {
        let mut out = self.originate_link_state(Some(peer));
        for (&origin, state) in &self.link_states {
            if origin != peer {
                out.push(Outbound {
                    next_hop: peer,
                    packet: Packet::link_state(origin, peer, state.clone()),
                });
            }
        }
        out
    }

    // -------------------------------------------------------- distance-vector

    fn on_distance_vector(
        &mut self,
        from: PortId,
        vector: DistanceVector,
    ) -> Result<Vec<Outbound>> {
        self.neighbor_dvs.insert(from, vector);
        if self.recompute_distance_vector()? {
            self.awaiting_sync.remove(&from);
            return Ok(self.distance_vector_advertisements());
        }
        if self.awaiting_sync.remove(&from) {
            debug!(router = self.port, peer = from, "sending distance vector to new neighbor");
            return Ok(vec![self.distance_vector_for(from)]);
        }
        Ok(Vec::new())
    }

    fn recompute_distance_vector(&mut self) -> Result<bool> {
        let table = distance_vector::compute_route_table(
            self.port,
            &self.neighbors,
            &self.neighbor_dvs,
            self.dv_infinity,
        )?;
        Ok(self.install(table))
    }

    fn distance_vector_advertisements(&self) -> Vec<Outbound> {
        self.neighbors
            .keys()
            .map(|&peer| self.distance_vector_for(peer))
            .collect()
    }

    fn distance_vector_for(&self, peer: PortId) -> Outbound {
        Outbound {
            next_hop: peer,
            packet: Packet::distance_vector(
                self.port,
                peer,
                distance_vector::advertisement(&self.routes, peer),
            ),
        }
    }

    /// Replaces the route table if it changed. Returns whether it did.
    fn install(&mut self, table: RoutingTable) -> bool {
        if !table.has_changed_from(&self.routes) {
            debug!(router = self.port, routes = self.routes.len(), "route table is the same");
            return false;
        }
        self.log.push_with(
            "route table has changed",
            &json!({ "old": self.routes.to_map(), "new": table.to_map() }),
        );
        self.routes = table;
        true
    }
}
