use std::collections::BTreeMap;

use crate::error::{Result, RouterError};
use crate::protocol::{DvItem, RoutingTable};
use crate::types::{DistanceVector, NeighborTable};
use crate::{Cost, PortId};

/// Distributed Bellman-Ford step: own distance vector from the neighbors'
/// last advertised vectors.
///
/// Route to `d` = min over neighbors `n` of `cost(self, n) + vector[n][d]`,
/// with `n` as next hop. Costs at or above `infinity` are dropped.
pub fn compute_route_table(
    port: PortId,
    neighbors: &NeighborTable,
    neighbor_dvs: &BTreeMap<PortId, DistanceVector>,
    infinity: Cost,
) -> Result<RoutingTable> {
    if neighbors.len() != neighbor_dvs.len() {
        return Err(RouterError::Invariant(format!(
            "router {port} holds {} neighbors but {} neighbor vectors",
            neighbors.len(),
            neighbor_dvs.len()
        )));
    }

    let mut table = RoutingTable::with_self(port);
    for (&neighbor, vector) in neighbor_dvs {
        let link = neighbors.get(&neighbor).ok_or_else(|| {
            RouterError::Invariant(format!(
                "router {port} holds a vector from non-neighbor {neighbor}"
            ))
        })?;
        for (&dest, &advertised) in vector {
            if dest == port {
                continue;
            }
            let cost = link.cost.saturating_add(advertised);
            if cost >= infinity {
                continue;
            }
            table.offer(dest, cost, neighbor);
        }
    }
    Ok(table)
}

/// Vector to send to `to`, with poison reverse: routes whose next hop is
/// `to` are withheld.
pub fn advertisement(table: &RoutingTable, to: PortId) -> Vec<DvItem> {
    table
        .iter()
        .filter(|entry| entry.next_hop != Some(to))
        .map(|entry| DvItem {
            dest: entry.dest,
            cost: entry.cost,
        })
        .collect()
}

/// Vector a newly recognized neighbor is seeded with before it advertises.
pub fn seed_vector(neighbor: PortId) -> DistanceVector {
    DistanceVector::from([(neighbor, 0)])
}
