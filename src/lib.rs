pub mod algorithms;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod network;
pub mod protocol;
pub mod router;
pub mod types;

/// Endpoint identifier naming a router. Assigned by the controller, never reused.
pub type PortId = u32;

/// Link cost. Always strictly positive on a real link.
pub type Cost = u32;

pub use config::RouterConfig;
pub use controller::RouterController;
pub use error::{Result, RouterError};
pub use logging::{LogEvent, LogSink};
pub use router::Router;
pub use types::{Algorithm, Neighbor, RouteEntry, RouterInfo, RouterState};
