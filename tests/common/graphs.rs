use std::collections::BTreeMap;

use routesim::types::Algorithm;
use routesim::{Cost, PortId};

use crate::common::virtual_network::VirtualNetwork;

pub type Links = Vec<(PortId, PortId, Cost)>;

/// A(100) - B(101) - C(102), costs 10 and 5.
pub fn line(algorithm: Algorithm) -> VirtualNetwork {
    VirtualNetwork::create(algorithm, &[100, 101, 102], &[(100, 101, 10), (101, 102, 5)])
}

pub fn weighted_nodes() -> Vec<PortId> {
    vec![1, 2, 3, 4, 5]
}

pub fn weighted_links() -> Links {
    vec![
        (1, 2, 2),
        (1, 3, 1),
        (2, 3, 4),
        (2, 4, 5),
        (3, 4, 100),
        (3, 5, 8),
        (4, 5, 1),
    ]
}

pub fn vnet_simple_weighted(algorithm: Algorithm) -> VirtualNetwork {
    VirtualNetwork::create(algorithm, &weighted_nodes(), &weighted_links())
}

/// Two triangles joined by a single expensive bridge, plus a chord.
pub fn mesh_nodes() -> Vec<PortId> {
    (10..18).collect()
}

pub fn mesh_links() -> Links {
    vec![
        (10, 11, 1),
        (11, 12, 1),
        (10, 12, 3),
        (12, 13, 20),
        (13, 14, 2),
        (14, 15, 2),
        (13, 15, 5),
        (15, 16, 1),
        (16, 17, 7),
        (11, 17, 40),
    ]
}

/// Floyd-Warshall over an undirected link list.
pub fn all_pairs(
    nodes: &[PortId],
    links: &[(PortId, PortId, Cost)],
) -> BTreeMap<(PortId, PortId), u64> {
    let mut dist = BTreeMap::new();
    for &n in nodes {
        dist.insert((n, n), 0u64);
    }
    for &(a, b, cost) in links {
        let cost = cost as u64;
        for key in [(a, b), (b, a)] {
            let entry = dist.entry(key).or_insert(u64::MAX);
            *entry = (*entry).min(cost);
        }
    }
    for &k in nodes {
        for &i in nodes {
            for &j in nodes {
                let (Some(&ik), Some(&kj)) = (dist.get(&(i, k)), dist.get(&(k, j))) else {
                    continue;
                };
                let through = ik + kj;
                let entry = dist.entry((i, j)).or_insert(u64::MAX);
                if through < *entry {
                    *entry = through;
                }
            }
        }
    }
    dist
}

/// Checks every router's table against the true shortest paths: one entry
/// per reachable node, exact cost, and a next hop that lies on a shortest
/// path.
pub fn assert_matches_shortest_paths(
    network: &VirtualNetwork,
    nodes: &[PortId],
    links: &[(PortId, PortId, Cost)],
) {
    let dist = all_pairs(nodes, links);
    let link_cost = |a: PortId, b: PortId| {
        links
            .iter()
            .filter(|&&(x, y, _)| (x, y) == (a, b) || (x, y) == (b, a))
            .map(|&(_, _, c)| c as u64)
            .min()
    };

    for &src in nodes {
        let table = network.routers[&src].routes();
        let reachable = nodes.iter().filter(|&&d| dist.contains_key(&(src, d))).count();
        assert_eq!(table.len(), reachable, "router {src} has the wrong number of routes");

        for &dest in nodes {
            let Some(&expected) = dist.get(&(src, dest)) else {
                assert!(network.route(src, dest).is_none(), "{src} should not reach {dest}");
                continue;
            };
            let route = network
                .route(src, dest)
                .unwrap_or_else(|| panic!("{src} has no route to {dest}"));
            assert_eq!(route.cost as u64, expected, "cost from {src} to {dest}");

            if dest == src {
                assert_eq!(route.next_hop, None);
                continue;
            }
            let hop = route.next_hop.unwrap();
            let first = link_cost(src, hop)
                .unwrap_or_else(|| panic!("{hop} is not adjacent to {src}"));
            assert_eq!(first + dist[&(hop, dest)], expected, "next hop {hop} from {src} to {dest}");
        }
    }
}
