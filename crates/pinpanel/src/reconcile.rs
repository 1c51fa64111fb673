//! State reconciliation: refresh cached pin levels from the hardware.
//!
//! Runs before every render. A pin whose read fails keeps its previous cached
//! level and the pass moves on, so one bad line never hides the others.
//!
//! A render that follows a dispatch immediately can still see the pre-write
//! level when the write task has not reached the adapter yet; the next render
//! catches up.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::hardware::{GpioAdapter, HardwareError};
use crate::metrics::PanelMetrics;
use crate::registry::{Pin, PinId, PinRegistry};

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Every registered pin in id order, with the freshest level available.
    pub pins: Vec<Pin>,
    /// Pins whose read failed this pass; their level is the cached one.
    pub stale: Vec<(PinId, HardwareError)>,
}

impl Snapshot {
    pub fn is_complete(&self) -> bool {
        self.stale.is_empty()
    }

    pub fn level(&self, pin: PinId) -> Option<bool> {
        self.pins.iter().find(|p| p.id == pin).map(|p| p.level)
    }
}

pub struct Reconciler {
    registry: Arc<PinRegistry>,
    gpio: Arc<dyn GpioAdapter>,
    metrics: PanelMetrics,
}

impl Reconciler {
    pub fn new(registry: Arc<PinRegistry>, gpio: Arc<dyn GpioAdapter>) -> Self {
        Self {
            registry,
            gpio,
            metrics: PanelMetrics::new(),
        }
    }

    /// Re-read every registered pin and return the refreshed view.
    pub async fn snapshot(&self) -> Snapshot {
        let mut stale = Vec::new();

        for pin in self.registry.ids() {
            match self.gpio.read(pin).await {
                Ok(level) => {
                    trace!(pin = %pin, level, "Reconciled pin");
                    self.registry.set_level(pin, level);
                }
                Err(e) => {
                    warn!(pin = %pin, error = %e, "Pin read failed; keeping cached level");
                    self.metrics.hardware_error(pin, "read");
                    stale.push((pin, e));
                }
            }
        }

        Snapshot {
            pins: self.registry.all(),
            stale,
        }
    }
}
