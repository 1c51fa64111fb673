//! Linux GPIO character device backend (`/dev/gpiochipN`).
//!
//! Each registered pin is requested as its own single-line output handle so a
//! slow or failing line does not hold up the others.

use async_gpiod::{Chip, Lines, Options, Output};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{GpioAdapter, HardwareError};
use crate::registry::PinId;

pub struct ChardevGpio {
    chip: Chip,
    chip_name: String,
    consumer: String,
    lines: DashMap<PinId, Arc<Lines<Output>>>,
}

impl ChardevGpio {
    pub async fn open(chip_name: &str, consumer: &str) -> Result<Self, HardwareError> {
        let chip = Chip::new(chip_name)
            .await
            .map_err(|e| HardwareError::Chip {
                chip: chip_name.to_string(),
                message: e.to_string(),
            })?;

        info!(chip = %chip_name, "Opened gpio chip");

        Ok(Self {
            chip,
            chip_name: chip_name.to_string(),
            consumer: consumer.to_string(),
            lines: DashMap::new(),
        })
    }

    fn line(&self, pin: PinId) -> Result<Arc<Lines<Output>>, HardwareError> {
        // Clone the handle out so the map shard is released before any I/O
        self.lines
            .get(&pin)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(HardwareError::NotConfigured(pin))
    }
}

fn io_error(pin: PinId, err: std::io::Error) -> HardwareError {
    HardwareError::Io {
        pin,
        message: err.to_string(),
    }
}

#[async_trait]
impl GpioAdapter for ChardevGpio {
    async fn configure_output(&self, pin: PinId) -> Result<(), HardwareError> {
        let options = Options::output([pin.0])
            .values([false])
            .consumer(self.consumer.as_str());

        let lines = self
            .chip
            .request_lines(options)
            .await
            .map_err(|e| io_error(pin, e))?;

        debug!(chip = %self.chip_name, pin = %pin, "Requested output line");
        self.lines.insert(pin, Arc::new(lines));
        Ok(())
    }

    async fn write(&self, pin: PinId, level: bool) -> Result<(), HardwareError> {
        let line = self.line(pin)?;
        line.set_values([level]).await.map_err(|e| io_error(pin, e))
    }

    async fn read(&self, pin: PinId) -> Result<bool, HardwareError> {
        let line = self.line(pin)?;
        let [level] = line
            .get_values([false; 1])
            .await
            .map_err(|e| io_error(pin, e))?;
        Ok(level)
    }

    fn backend_name(&self) -> &'static str {
        "chardev"
    }
}
