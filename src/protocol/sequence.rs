use std::collections::BTreeMap;

use crate::PortId;

/// Whether `received` is newer than `last` for a counter that wraps at a
/// fixed modulus. A drop of more than `wrap_threshold` is read as the
/// origin having wrapped around.
pub fn is_newer(last: u32, received: u32, wrap_threshold: u32) -> bool {
    received > last || last - received > wrap_threshold
}

/// Advances a wrapping sequence counter, returning the value to use now.
pub fn next(counter: &mut u32, modulus: u32) -> u32 {
    let current = *counter;
    *counter = (current + 1) % modulus;
    current
}

/// Last accepted link-state sequence number per origin.
#[derive(Debug, Clone, Default)]
pub struct SequenceLedger {
    accepted: BTreeMap<PortId, u32>,
    wrap_threshold: u32,
}

impl SequenceLedger {
    pub fn new(wrap_threshold: u32) -> Self {
        Self {
            accepted: BTreeMap::new(),
            wrap_threshold,
        }
    }

    /// Records `sequence` for `origin` if it is new. Returns false for
    /// duplicates and stale advertisements.
    pub fn accept(&mut self, origin: PortId, sequence: u32) -> bool {
        let fresh = match self.accepted.get(&origin) {
            None => true,
            Some(&last) => is_newer(last, sequence, self.wrap_threshold),
        };
        if fresh {
            self.accepted.insert(origin, sequence);
        }
        fresh
    }

    pub fn clear(&mut self) {
        self.accepted.clear();
    }
}
