pub mod fabric;

pub use fabric::{Datagram, Endpoint, Fabric, Inbox};
