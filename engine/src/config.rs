//! Engine tuning knobs.

use crate::queue::DEFAULT_QUEUE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Maximum number of queued offline entries
    pub queue_capacity: usize,
    /// Vibration on a successful direct save, in milliseconds
    pub save_vibration_ms: u64,
    pub scanner: ScannerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            save_vibration_ms: 60,
            scanner: ScannerConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn save_vibration(&self) -> Duration {
        Duration::from_millis(self.save_vibration_ms)
    }
}

/// Scanner session timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerConfig {
    /// Window in which a repeated code is suppressed
    pub cooldown_ms: u64,
    /// Keep scanning after a detection instead of closing the sheet
    pub continuous: bool,
    pub torch_probe_attempts: u32,
    pub torch_probe_interval_ms: u64,
    /// Delay between a detection and the sheet closing
    pub auto_close_delay_ms: u64,
    pub success_pulse_ms: u64,
    pub detect_vibration_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1500,
            continuous: false,
            torch_probe_attempts: 10,
            torch_probe_interval_ms: 200,
            auto_close_delay_ms: 320,
            success_pulse_ms: 190,
            detect_vibration_ms: 80,
        }
    }
}

impl ScannerConfig {
    pub fn torch_probe_interval(&self) -> Duration {
        Duration::from_millis(self.torch_probe_interval_ms)
    }

    pub fn auto_close_delay(&self) -> Duration {
        Duration::from_millis(self.auto_close_delay_ms)
    }

    pub fn success_pulse(&self) -> Duration {
        Duration::from_millis(self.success_pulse_ms)
    }

    pub fn detect_vibration(&self) -> Duration {
        Duration::from_millis(self.detect_vibration_ms)
    }
}
