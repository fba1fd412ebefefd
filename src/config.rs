use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::Result;

use crate::PortId;
use crate::types::Algorithm;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Algorithm used by routers created without an explicit choice
    pub algorithm: Algorithm,
    /// First identifier handed out by the controller
    pub first_port: PortId,
    pub ls_advertise_interval_ms: u64,
    pub dv_advertise_interval_ms: u64,
    /// Link-state sequence numbers live in `0..sequence_modulus`
    pub sequence_modulus: u32,
    /// A backward jump larger than this is read as wraparound
    pub sequence_wrap_threshold: u32,
    /// Distance-vector costs at or above this are unreachable
    pub dv_infinity: u32,
    /// Buffered log events per subscriber
    pub log_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::LinkState,
            first_port: 100,
            ls_advertise_interval_ms: 20_000, // 20 seconds
            dv_advertise_interval_ms: 30_000, // 30 seconds
            sequence_modulus: 4096,
            sequence_wrap_threshold: 1024,
            dv_infinity: 1024,
            log_capacity: 1024,
        }
    }
}

impl RouterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RouterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequence_modulus == 0 {
            anyhow::bail!("sequence_modulus must be positive");
        }
        if self.sequence_wrap_threshold >= self.sequence_modulus {
            anyhow::bail!(
                "sequence_wrap_threshold ({}) must be below sequence_modulus ({})",
                self.sequence_wrap_threshold,
                self.sequence_modulus
            );
        }
        if self.ls_advertise_interval_ms == 0 || self.dv_advertise_interval_ms == 0 {
            anyhow::bail!("advertise intervals must be positive");
        }
        if self.log_capacity == 0 {
            anyhow::bail!("log_capacity must be positive");
        }
        Ok(())
    }

    pub fn advertise_interval(&self, algorithm: Algorithm) -> Duration {
        match algorithm {
            Algorithm::LinkState => Duration::from_millis(self.ls_advertise_interval_ms),
            Algorithm::DistanceVector => Duration::from_millis(self.dv_advertise_interval_ms),
        }
    }
}
