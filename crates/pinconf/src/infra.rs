//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths the panel reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Thermal zone pseudo-file, read once at startup (millidegrees Celsius).
    /// Default: /sys/class/thermal/thermal_zone0/temp
    #[serde(default = "PathsConfig::default_thermal_file")]
    pub thermal_file: PathBuf,

    /// Directory holding the `{pin}-{on|off}.mp3` confirmation clips.
    /// Default: ./static/audio
    #[serde(default = "PathsConfig::default_audio_dir")]
    pub audio_dir: PathBuf,
}

impl PathsConfig {
    fn default_thermal_file() -> PathBuf {
        PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
    }

    fn default_audio_dir() -> PathBuf {
        PathBuf::from("static/audio")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            thermal_file: Self::default_thermal_file(),
            audio_dir: Self::default_audio_dir(),
        }
    }
}

/// Network bind address for the web front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Listen address.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_address")]
    pub address: String,

    /// HTTP port for the panel.
    /// Default: 8081
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_address() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        8081
    }

    /// `address:port` suitable for `TcpListener::bind`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry. When unset, logs go to stdout only.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Log filter directive (trace, debug, info, warn, error, or a full EnvFilter).
    /// Default: unset, which means `info,pinpanel=debug`
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Login gate.
///
/// Authentication is only enforced when a password is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Default: admin
    #[serde(default = "AuthConfig::default_username")]
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Sessions idle longer than this are dropped.
    /// Default: 3600
    #[serde(default = "AuthConfig::default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl AuthConfig {
    fn default_username() -> String {
        "admin".to_string()
    }

    fn default_session_idle_secs() -> u64 {
        3600
    }

    pub fn enabled(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: Self::default_username(),
            password: None,
            session_idle_secs: Self::default_session_idle_secs(),
        }
    }
}

/// Panel rendering and request behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSettings {
    /// Page title.
    /// Default: Control Panel
    #[serde(default = "PanelSettings::default_title")]
    pub title: String,

    /// Wait for the hardware write to finish before redirecting back to the
    /// panel. Off by default, so the first render after a toggle may still show
    /// the previous level.
    #[serde(default)]
    pub await_writes: bool,

    /// Port of the companion remote-desktop service behind `/VNC`.
    /// Default: 6080
    #[serde(default = "PanelSettings::default_vnc_port")]
    pub vnc_port: u16,
}

impl PanelSettings {
    fn default_title() -> String {
        "Control Panel".to_string()
    }

    fn default_vnc_port() -> u16 {
        6080
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            await_writes: false,
            vnc_port: Self::default_vnc_port(),
        }
    }
}
