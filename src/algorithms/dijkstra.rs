use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::error::{Result, RouterError};
use crate::protocol::RoutingTable;
use crate::types::{AdjacencyList, RouteEntry};
use crate::{Cost, PortId};

#[derive(Debug, PartialEq, Eq)]
struct State {
    cost: u64,
    router: PortId,
    next_hop: Option<PortId>,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap, lowest port first on ties
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.router.cmp(&self.router))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest paths from `source` over a possibly partial adjacency list.
///
/// An edge u->v is used only when v's own entry lists u as well. The
/// next hop of every destination is the first-hop neighbor of `source`
/// on its shortest path. Destinations that cannot be reached get no entry.
pub fn calculate_shortest_paths(adjacency: &AdjacencyList, source: PortId) -> Result<RoutingTable> {
    if !adjacency.contains_key(&source) {
        return Err(RouterError::Invariant(format!(
            "adjacency list has no entry for source {source}"
        )));
    }

    let mut distances: BTreeMap<PortId, u64> = BTreeMap::new();
    let mut table = RoutingTable::new();
    let mut heap = BinaryHeap::new();

    distances.insert(source, 0);
    heap.push(State {
        cost: 0,
        router: source,
        next_hop: None,
    });

    while let Some(State { cost, router, next_hop }) = heap.pop() {
        // Already expanded through a shorter path
        if table.get_route(router).is_some() {
            continue;
        }
        table.add_route(RouteEntry {
            dest: router,
            cost: saturate(cost),
            next_hop,
        });

        let Some(neighbors) = adjacency.get(&router) else {
            continue;
        };
        for link in neighbors.values() {
            let bidirectional = adjacency
                .get(&link.dest)
                .is_some_and(|back| back.contains_key(&router));
            if !bidirectional || table.get_route(link.dest).is_some() {
                continue;
            }

            let new_cost = cost + u64::from(link.cost);
            if new_cost < *distances.get(&link.dest).unwrap_or(&u64::MAX) {
                distances.insert(link.dest, new_cost);
                heap.push(State {
                    cost: new_cost,
                    router: link.dest,
                    next_hop: next_hop.or(Some(link.dest)),
                });
            }
        }
    }

    Ok(table)
}

fn saturate(cost: u64) -> Cost {
    Cost::try_from(cost).unwrap_or(Cost::MAX)
}
