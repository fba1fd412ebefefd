//! Router log stream and tracing setup.
//!
//! Every router owns a [`LogSink`] bound to its port. Events are mirrored to
//! `tracing` and fanned into a single broadcast channel owned by the
//! controller, which the boundary layer subscribes to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::PortId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub emitter: PortId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LogSink {
    emitter: PortId,
    tx: broadcast::Sender<LogEvent>,
}

impl LogSink {
    pub fn new(emitter: PortId, tx: broadcast::Sender<LogEvent>) -> Self {
        Self { emitter, tx }
    }

    /// A sink whose events go nowhere but `tracing`.
    pub fn detached(emitter: PortId) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { emitter, tx }
    }

    pub fn push(&self, message: impl Into<String>) {
        self.emit(message.into(), None, false);
    }

    pub fn push_with<T: Serialize>(&self, message: impl Into<String>, payload: &T) {
        let payload = serde_json::to_value(payload).ok();
        self.emit(message.into(), payload, false);
    }

    /// Same as [`LogSink::push`] but traced at warn level. Used for
    /// dropped packets and other network anomalies.
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(message.into(), None, true);
    }

    pub fn warn_with<T: Serialize>(&self, message: impl Into<String>, payload: &T) {
        let payload = serde_json::to_value(payload).ok();
        self.emit(message.into(), payload, true);
    }

    fn emit(&self, message: String, payload: Option<serde_json::Value>, warning: bool) {
        if warning {
            warn!(router = self.emitter, "{}", message);
        } else {
            info!(router = self.emitter, "{}", message);
        }
        let event = LogEvent {
            emitter: self.emitter,
            message,
            payload,
            timestamp: Utc::now(),
        };
        // No subscriber is not an error
        let _ = self.tx.send(event);
    }
}

/// Installs the fmt subscriber. Level comes from `RUST_LOG`, default `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
