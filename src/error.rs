//! Error types for router and controller operations.
//!
//! Network-level anomalies (stale advertisements, packets from strangers,
//! unknown destinations) never show up here. They are logged and dropped
//! inside packet handling.

use thiserror::Error;

use crate::PortId;
use crate::types::RouterState;

/// Errors returned synchronously by control operations.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No router is registered under this identifier
    #[error("router {0} is not registered")]
    UnknownRouter(PortId),

    /// Lifecycle call made from the wrong state
    #[error("router {port} cannot {action} while {from}")]
    InvalidTransition {
        port: PortId,
        from: RouterState,
        action: &'static str,
    },

    /// Peer is not in the router's neighbor table
    #[error("router {peer} is not a neighbor of router {port}")]
    NotNeighbor { port: PortId, peer: PortId },

    /// Link costs must be strictly positive
    #[error("invalid link cost {0}, costs must be positive")]
    InvalidCost(u32),

    /// A router cannot be linked to itself
    #[error("router {0} cannot be linked to itself")]
    SelfLink(PortId),

    /// Data can only be originated by a running router
    #[error("router {0} is not running")]
    NotRunning(PortId),

    /// Another endpoint is already bound to this identifier
    #[error("endpoint {0} is already bound")]
    AddressInUse(PortId),

    /// Internal data-model inconsistency. Indicates a bug.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Wire encoding failure
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl RouterError {
    /// True for usage mistakes the boundary layer should report back as a
    /// failed command.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, RouterError::Invariant(_) | RouterError::Codec(_))
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert!(RouterError::UnknownRouter(7).is_caller_error());
        assert!(RouterError::NotNeighbor { port: 1, peer: 2 }.is_caller_error());
        assert!(!RouterError::Invariant("no source".into()).is_caller_error());
    }

    #[test]
    fn renders_transition_message() {
        let err = RouterError::InvalidTransition {
            port: 100,
            from: RouterState::On,
            action: "run",
        };
        assert_eq!(err.to_string(), "router 100 cannot run while on");
    }
}
