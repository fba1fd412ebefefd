pub mod dijkstra;
pub mod distance_vector;

pub use dijkstra::calculate_shortest_paths;
