//! Configuration loading for pinpanel.
//!
//! Kept dependency-light so both the server and any tooling can read the same
//! files without dragging in the web stack.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/pinpanel/config.toml` (system)
//! 2. `~/.config/pinpanel/config.toml` (user)
//! 3. `./pinpanel.toml` (local override, or the `--config` path)
//! 4. Environment variables (`PINPANEL_*`)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! address = "0.0.0.0"
//! http_port = 8081
//!
//! [paths]
//! thermal_file = "/sys/class/thermal/thermal_zone0/temp"
//! audio_dir = "/opt/pinpanel/audio"
//!
//! [gpio]
//! backend = "chardev"
//! chip = "gpiochip0"
//!
//! [auth]
//! username = "admin"
//! password = "hunter2"
//!
//! [[pins]]
//! id = 7
//! name = "Porch light"
//!
//! [[pins]]
//! id = 11
//! ```

pub mod board;
pub mod infra;
pub mod loader;

pub use board::{AudioConfig, CommandsConfig, GpioBackend, GpioConfig, PinSpec};
pub use infra::{AuthConfig, BindConfig, PanelSettings, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete pinpanel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub gpio: GpioConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub panel: PanelSettings,

    /// Registered pins, fixed for the lifetime of the process.
    #[serde(default = "PinSpec::defaults")]
    pub pins: Vec<PinSpec>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            bind: BindConfig::default(),
            telemetry: TelemetryConfig::default(),
            paths: PathsConfig::default(),
            gpio: GpioConfig::default(),
            audio: AudioConfig::default(),
            commands: CommandsConfig::default(),
            auth: AuthConfig::default(),
            panel: PanelSettings::default(),
            pins: PinSpec::defaults(),
        }
    }
}

impl PanelConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` stand in for `./pinpanel.toml`.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::from_table(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML. The password is masked.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# pinpanel configuration\n\n");

        output.push_str("[bind]\n");
        output.push_str(&format!("address = \"{}\"\n", self.bind.address));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));

        output.push_str("\n[telemetry]\n");
        if let Some(ref endpoint) = self.telemetry.otlp_endpoint {
            output.push_str(&format!("otlp_endpoint = \"{}\"\n", endpoint));
        }
        if let Some(ref level) = self.telemetry.log_level {
            output.push_str(&format!("log_level = \"{}\"\n", level));
        }

        output.push_str("\n[paths]\n");
        output.push_str(&format!(
            "thermal_file = \"{}\"\n",
            self.paths.thermal_file.display()
        ));
        output.push_str(&format!(
            "audio_dir = \"{}\"\n",
            self.paths.audio_dir.display()
        ));

        output.push_str("\n[gpio]\n");
        output.push_str(&format!("backend = \"{}\"\n", self.gpio.backend));
        output.push_str(&format!("chip = \"{}\"\n", self.gpio.chip));
        output.push_str(&format!("consumer = \"{}\"\n", self.gpio.consumer));

        output.push_str("\n[audio]\n");
        output.push_str(&format!("enabled = {}\n", self.audio.enabled));
        output.push_str(&format!("player = \"{}\"\n", self.audio.player));

        output.push_str("\n[commands]\n");
        output.push_str(&format!("shutdown = {}\n", quoted_list(&self.commands.shutdown)));
        output.push_str(&format!("restart = {}\n", quoted_list(&self.commands.restart)));

        output.push_str("\n[auth]\n");
        output.push_str(&format!("username = \"{}\"\n", self.auth.username));
        if self.auth.enabled() {
            output.push_str("password = \"********\"\n");
        }
        output.push_str(&format!(
            "session_idle_secs = {}\n",
            self.auth.session_idle_secs
        ));

        output.push_str("\n[panel]\n");
        output.push_str(&format!("title = \"{}\"\n", self.panel.title));
        output.push_str(&format!("await_writes = {}\n", self.panel.await_writes));
        output.push_str(&format!("vnc_port = {}\n", self.panel.vnc_port));

        for pin in &self.pins {
            output.push_str("\n[[pins]]\n");
            output.push_str(&format!("id = {}\n", pin.id));
            output.push_str(&format!("name = \"{}\"\n", pin.display_name()));
        }

        output
    }
}

fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("\"{}\"", s)).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PanelConfig::default();
        assert_eq!(config.bind.http_port, 8081);
        assert_eq!(config.pins.len(), 6);
        assert!(!config.auth.enabled());
        assert!(!config.panel.await_writes);
    }

    #[test]
    fn test_to_toml() {
        let config = PanelConfig::default();
        let toml = config.to_toml();
        assert!(toml.contains("[bind]"));
        assert!(toml.contains("[gpio]"));
        assert!(toml.contains("[[pins]]"));
        assert!(toml.contains("name = \"GPIO 22\""));
    }

    #[test]
    fn test_to_toml_masks_password() {
        let mut config = PanelConfig::default();
        config.auth.password = Some("hunter2".to_string());
        let toml = config.to_toml();
        assert!(!toml.contains("hunter2"));
        assert!(toml.contains("********"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = PanelConfig::default();
        config.pins = vec![PinSpec::named(7, "Porch"), PinSpec::new(11)];
        let table: toml::Table = config.to_toml().parse().unwrap();
        let parsed = loader::from_table(table, std::path::Path::new("roundtrip.toml")).unwrap();
        assert_eq!(parsed.pins[0].display_name(), "Porch");
        assert_eq!(parsed.pins[1].id, 11);
        assert_eq!(parsed.bind, config.bind);
    }
}
