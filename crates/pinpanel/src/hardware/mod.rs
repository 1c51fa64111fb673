//! Hardware adapter boundary.
//!
//! The panel never touches pins directly; it goes through [`GpioAdapter`]. Real
//! boards use the character-device backend, everything else (development,
//! tests) uses [`SimulatedGpio`].

mod simulated;

#[cfg(all(feature = "chardev", target_os = "linux"))]
mod chardev;

pub use simulated::SimulatedGpio;

#[cfg(all(feature = "chardev", target_os = "linux"))]
pub use chardev::ChardevGpio;

use async_trait::async_trait;
use pinconf::{GpioBackend, GpioConfig};
use std::sync::Arc;
use thiserror::Error;

use crate::registry::PinId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("pin {0} has not been configured as an output")]
    NotConfigured(PinId),

    #[error("gpio chip {chip} unavailable: {message}")]
    Chip { chip: String, message: String },

    #[error("gpio i/o on pin {pin} failed: {message}")]
    Io { pin: PinId, message: String },
}

/// Digital output lines.
///
/// Calls may block on real I/O, so callers must not hold shared locks across them.
#[async_trait]
pub trait GpioAdapter: Send + Sync + 'static {
    /// Claim the line as an output. Called once per pin at startup.
    async fn configure_output(&self, pin: PinId) -> Result<(), HardwareError>;

    async fn write(&self, pin: PinId, level: bool) -> Result<(), HardwareError>;

    async fn read(&self, pin: PinId) -> Result<bool, HardwareError>;

    /// Short backend name for logs and `/health`.
    fn backend_name(&self) -> &'static str;
}

/// Open the adapter selected in configuration.
pub async fn open(config: &GpioConfig) -> anyhow::Result<Arc<dyn GpioAdapter>> {
    match config.backend {
        GpioBackend::Simulated => Ok(Arc::new(SimulatedGpio::new())),
        #[cfg(all(feature = "chardev", target_os = "linux"))]
        GpioBackend::Chardev => {
            let gpio = ChardevGpio::open(&config.chip, &config.consumer).await?;
            Ok(Arc::new(gpio))
        }
        #[cfg(not(all(feature = "chardev", target_os = "linux")))]
        GpioBackend::Chardev => anyhow::bail!(
            "gpio backend 'chardev' requested but pinpanel was built without the `chardev` feature"
        ),
    }
}
