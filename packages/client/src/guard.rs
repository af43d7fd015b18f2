//! Scoped fan reset.
//!
//! A [`FanResetGuard`] is created before the first fan command is issued and
//! hands the fan back to automatic control exactly once: either through
//! [`FanResetGuard::release`] or, if the guard is dropped while still armed
//! (panic unwinding, cancelled future), from `Drop`.

use std::sync::Arc;

use crate::actuator::FanControl;

pub struct FanResetGuard {
    fan: Arc<dyn FanControl>,
    gpu: u32,
    armed: bool,
}

impl FanResetGuard {
    pub fn new(fan: Arc<dyn FanControl>, gpu: u32) -> Self {
        Self {
            fan,
            gpu,
            armed: true,
        }
    }

    /// Reset the fan on the blocking pool and disarm the guard
    pub async fn release(mut self) {
        self.armed = false;
        let fan = self.fan.clone();
        let gpu = self.gpu;
        if let Err(e) = tokio::task::spawn_blocking(move || reset(fan.as_ref(), gpu)).await {
            tracing::error!("Fan reset task failed: {}", e);
        }
    }
}

impl Drop for FanResetGuard {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            reset(self.fan.as_ref(), self.gpu);
        }
    }
}

fn reset(fan: &dyn FanControl, gpu: u32) {
    match fan.reset_fan(gpu) {
        Ok(()) => tracing::info!("Fan control on GPU {} returned to automatic", gpu),
        Err(e) => tracing::error!("Failed to reset fan on GPU {}: {}", gpu, e),
    }
}
