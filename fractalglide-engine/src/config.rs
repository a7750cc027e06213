//! Scheduler configuration.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Tuning knobs for the [`Zoomer`](crate::Zoomer) scheduler.
///
/// Times are in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomerConfig {
    /// Target frames per second. Adaptively reduced when frames drop.
    pub frame_rate: f64,
    /// Longest continuous stretch of work per mainloop tick, so the
    /// surrounding application stays responsive.
    pub update_slice: f64,
    /// Per-frame compute budget when the view has not moved recently.
    pub update_idle_burst: f64,
    /// How long after the last wake the view counts as idle.
    pub wake_timeout: f64,
    /// Low-pass coefficient for all moving averages.
    pub coef: f64,
    /// Run the renderer inline on the main context instead of on the
    /// two render worker threads.
    pub disable_workers: bool,
}

impl Default for ZoomerConfig {
    fn default() -> Self {
        Self {
            frame_rate: 20.0,
            update_slice: 5.0,
            update_idle_burst: 500.0,
            wake_timeout: 500.0,
            coef: 0.10,
            disable_workers: false,
        }
    }
}

impl ZoomerConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.frame_rate > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if !(self.update_slice > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "update_slice must be positive, got {}",
                self.update_slice
            )));
        }
        if !(self.coef > 0.0 && self.coef <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "coef must be in (0, 1], got {}",
                self.coef
            )));
        }
        Ok(())
    }
}
