//! Board configuration - the pins, the GPIO backend, and the side-effect
//! programs a toggle or a privileged command runs.

use serde::{Deserialize, Serialize};

/// One controllable output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSpec {
    /// Logical pin number; also the hardware line offset.
    pub id: u32,

    /// Display name. Defaults to `GPIO <id>`.
    #[serde(default)]
    pub name: Option<String>,
}

impl PinSpec {
    pub fn new(id: u32) -> Self {
        Self { id, name: None }
    }

    pub fn named(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("GPIO {}", self.id))
    }

    /// Pins registered when no `[[pins]]` table is configured.
    pub fn defaults() -> Vec<PinSpec> {
        [1, 2, 3, 4, 15, 22].into_iter().map(PinSpec::new).collect()
    }
}

/// Which hardware adapter drives the pins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackend {
    /// In-memory lines, for development off-board.
    #[default]
    Simulated,
    /// Linux GPIO character device (`/dev/gpiochipN`).
    Chardev,
}

impl std::fmt::Display for GpioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpioBackend::Simulated => write!(f, "simulated"),
            GpioBackend::Chardev => write!(f, "chardev"),
        }
    }
}

impl std::str::FromStr for GpioBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(GpioBackend::Simulated),
            "chardev" | "gpiod" => Ok(GpioBackend::Chardev),
            other => Err(format!("unknown gpio backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioConfig {
    #[serde(default)]
    pub backend: GpioBackend,

    /// GPIO chip name for the chardev backend.
    /// Default: gpiochip0
    #[serde(default = "GpioConfig::default_chip")]
    pub chip: String,

    /// Consumer label shown by `gpioinfo`.
    /// Default: pinpanel
    #[serde(default = "GpioConfig::default_consumer")]
    pub consumer: String,
}

impl GpioConfig {
    fn default_chip() -> String {
        "gpiochip0".to_string()
    }

    fn default_consumer() -> String {
        "pinpanel".to_string()
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: GpioBackend::default(),
            chip: Self::default_chip(),
            consumer: Self::default_consumer(),
        }
    }
}

/// Audible confirmation of toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Default: true
    #[serde(default = "AudioConfig::default_enabled")]
    pub enabled: bool,

    /// Player program, invoked with the clip path as its only argument.
    /// Default: mpg123
    #[serde(default = "AudioConfig::default_player")]
    pub player: String,
}

impl AudioConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_player() -> String {
        "mpg123".to_string()
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            player: Self::default_player(),
        }
    }
}

/// argv for the privileged system commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Default: ["sudo", "shutdown", "-h", "now"]
    #[serde(default = "CommandsConfig::default_shutdown")]
    pub shutdown: Vec<String>,

    /// Default: ["sudo", "reboot"]
    #[serde(default = "CommandsConfig::default_restart")]
    pub restart: Vec<String>,
}

impl CommandsConfig {
    fn default_shutdown() -> Vec<String> {
        ["sudo", "shutdown", "-h", "now"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_restart() -> Vec<String> {
        ["sudo", "reboot"].into_iter().map(String::from).collect()
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            shutdown: Self::default_shutdown(),
            restart: Self::default_restart(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pins() {
        let pins = PinSpec::defaults();
        let ids: Vec<u32> = pins.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 15, 22]);
        assert_eq!(pins[4].display_name(), "GPIO 15");
    }

    #[test]
    fn test_named_pin() {
        assert_eq!(PinSpec::named(7, "Porch light").display_name(), "Porch light");
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("chardev".parse::<GpioBackend>().unwrap(), GpioBackend::Chardev);
        assert_eq!("SIM".parse::<GpioBackend>().unwrap(), GpioBackend::Simulated);
        assert!("wiringpi".parse::<GpioBackend>().is_err());
    }
}
