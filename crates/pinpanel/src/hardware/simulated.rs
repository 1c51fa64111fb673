//! In-memory GPIO lines.
//!
//! Besides standing in for a board during development, the simulator keeps a
//! log of every write it was asked to make and can be told to fail on chosen
//! pins, which is what the dispatch and reconciliation tests assert against.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{GpioAdapter, HardwareError};
use crate::registry::PinId;

#[derive(Debug, Default)]
struct Lines {
    levels: HashMap<PinId, bool>,
    faulty: HashSet<PinId>,
    writes: Vec<(PinId, bool)>,
    reads: usize,
}

#[derive(Debug, Default)]
pub struct SimulatedGpio {
    lines: Mutex<Lines>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(&self) -> MutexGuard<'_, Lines> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change a line's level behind the panel's back, as a physical switch or
    /// another process would.
    pub fn set_external(&self, pin: PinId, level: bool) {
        self.lines().levels.insert(pin, level);
    }

    /// Make every subsequent read and write on `pin` fail.
    pub fn fail_pin(&self, pin: PinId) {
        self.lines().faulty.insert(pin);
    }

    pub fn heal_pin(&self, pin: PinId) {
        self.lines().faulty.remove(&pin);
    }

    /// Current physical level, if the line was configured.
    pub fn level(&self, pin: PinId) -> Option<bool> {
        self.lines().levels.get(&pin).copied()
    }

    /// Every write call received, in arrival order, including failed ones.
    pub fn writes(&self) -> Vec<(PinId, bool)> {
        self.lines().writes.clone()
    }

    pub fn writes_to(&self, pin: PinId) -> usize {
        self.lines().writes.iter().filter(|(p, _)| *p == pin).count()
    }

    pub fn read_count(&self) -> usize {
        self.lines().reads
    }
}

#[async_trait]
impl GpioAdapter for SimulatedGpio {
    async fn configure_output(&self, pin: PinId) -> Result<(), HardwareError> {
        let mut lines = self.lines();
        if lines.faulty.contains(&pin) {
            return Err(HardwareError::Io {
                pin,
                message: "simulated fault".to_string(),
            });
        }
        lines.levels.entry(pin).or_insert(false);
        Ok(())
    }

    async fn write(&self, pin: PinId, level: bool) -> Result<(), HardwareError> {
        let mut lines = self.lines();
        lines.writes.push((pin, level));
        if lines.faulty.contains(&pin) {
            return Err(HardwareError::Io {
                pin,
                message: "simulated fault".to_string(),
            });
        }
        match lines.levels.get_mut(&pin) {
            Some(slot) => {
                *slot = level;
                Ok(())
            }
            None => Err(HardwareError::NotConfigured(pin)),
        }
    }

    async fn read(&self, pin: PinId) -> Result<bool, HardwareError> {
        let mut lines = self.lines();
        lines.reads += 1;
        if lines.faulty.contains(&pin) {
            return Err(HardwareError::Io {
                pin,
                message: "simulated fault".to_string(),
            });
        }
        lines
            .levels
            .get(&pin)
            .copied()
            .ok_or(HardwareError::NotConfigured(pin))
    }

    fn backend_name(&self) -> &'static str {
        "simulated"
    }
}
