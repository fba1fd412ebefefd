use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Cost, PortId};

/// A direct link as seen from one end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub dest: PortId,
    pub cost: Cost,
}

/// One row of a route table. `next_hop` is `None` only for the router's own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub dest: PortId,
    pub cost: Cost,
    pub next_hop: Option<PortId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "link-state", alias = "ls")]
    LinkState,
    #[serde(rename = "distance-vector", alias = "dv")]
    DistanceVector,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::LinkState => write!(f, "link-state"),
            Algorithm::DistanceVector => write!(f, "distance-vector"),
        }
    }
}

/// Router lifecycle. Routers are created `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterState {
    #[default]
    Off,
    On,
    Fault,
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterState::Off => write!(f, "off"),
            RouterState::On => write!(f, "on"),
            RouterState::Fault => write!(f, "fault"),
        }
    }
}

pub type NeighborTable = BTreeMap<PortId, Neighbor>;
pub type AdjacencyList = BTreeMap<PortId, NeighborTable>;
/// Destination -> advertised cost.
pub type DistanceVector = BTreeMap<PortId, Cost>;

/// Read-only snapshot of a router, safe to hand to the boundary layer.
///
/// Only one of `adjacency_list` / `neighbor_dvs` is populated, depending on
/// the algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterInfo {
    pub port: PortId,
    pub algorithm: Algorithm,
    pub state: RouterState,
    pub neighbors: NeighborTable,
    pub adjacency_list: AdjacencyList,
    #[serde(rename = "neighborsDVs")]
    pub neighbor_dvs: BTreeMap<PortId, DistanceVector>,
    pub route_table: BTreeMap<PortId, RouteEntry>,
}

impl RouterInfo {
    pub fn route_to(&self, dest: PortId) -> Option<&RouteEntry> {
        self.route_table.get(&dest)
    }
}
