use serde::{Deserialize, Serialize};

use crate::types::Neighbor;
use crate::{Cost, PortId};

/// End-to-end packet. `src`/`dest` survive forwarding unchanged; the
/// link-layer sender travels with the datagram instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub src: PortId,
    pub dest: PortId,
    #[serde(flatten)]
    pub body: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", content = "data", rename_all = "kebab-case")]
pub enum Payload {
    LinkState(LinkState),
    DistanceVector(Vec<DvItem>),
    Data(String),
}

/// Link-state advertisement: the origin's full neighbor set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkState {
    pub neighbors: Vec<Neighbor>,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvItem {
    pub dest: PortId,
    pub cost: Cost,
}

impl Packet {
    pub fn link_state(src: PortId, dest: PortId, state: LinkState) -> Self {
        Self { src, dest, body: Payload::LinkState(state) }
    }

    pub fn distance_vector(src: PortId, dest: PortId, items: Vec<DvItem>) -> Self {
        Self { src, dest, body: Payload::DistanceVector(items) }
    }

    pub fn data(src: PortId, dest: PortId, text: impl Into<String>) -> Self {
        Self { src, dest, body: Payload::Data(text.into()) }
    }

    pub fn protocol(&self) -> &'static str {
        match self.body {
            Payload::LinkState(_) => "link-state",
            Payload::DistanceVector(_) => "distance-vector",
            Payload::Data(_) => "data",
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
