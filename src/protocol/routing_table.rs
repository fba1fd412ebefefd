use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::RouteEntry;
use crate::{Cost, PortId};

/// Route table keyed by destination. At most one entry per destination;
/// unreachable destinations have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    entries: BTreeMap<PortId, RouteEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Table holding only the reflexive entry for `port`.
    pub fn with_self(port: PortId) -> Self {
        let mut table = Self::new();
        table.add_route(RouteEntry { dest: port, cost: 0, next_hop: None });
        table
    }

    pub fn add_route(&mut self, entry: RouteEntry) {
        self.entries.insert(entry.dest, entry);
    }

    /// Inserts or replaces the route to `dest` if `cost` beats the current one.
    pub fn offer(&mut self, dest: PortId, cost: Cost, next_hop: PortId) -> bool {
        match self.entries.get(&dest) {
            Some(existing) if existing.cost <= cost => false,
            _ => {
                self.add_route(RouteEntry { dest, cost, next_hop: Some(next_hop) });
                true
            }
        }
    }

    pub fn get_route(&self, dest: PortId) -> Option<&RouteEntry> {
        self.entries.get(&dest)
    }

    pub fn next_hop(&self, dest: PortId) -> Option<PortId> {
        self.entries.get(&dest).and_then(|entry| entry.next_hop)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }

    /// Differs in size, or in existence, cost or next hop of any entry.
    pub fn has_changed_from(&self, other: &RoutingTable) -> bool {
        self != other
    }

    pub fn to_map(&self) -> BTreeMap<PortId, RouteEntry> {
        self.entries.clone()
    }
}
