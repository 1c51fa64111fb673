//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, PanelConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
    /// Environment variables that were set but could not be parsed
    pub env_rejected: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/pinpanel/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("pinpanel/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("pinpanel.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Load a single config file on its own, without discovery or env overlay.
pub fn load_from_file(path: &Path) -> Result<PanelConfig, ConfigError> {
    from_table(load_table(path)?, path)
}

/// Deep-merge `overlay` into `base`.
///
/// Tables merge key by key; any other value (arrays included, so `[[pins]]`)
/// is replaced wholesale by the overlay.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Deserialize a merged table, filling gaps from compiled defaults.
pub fn from_table(table: toml::Table, origin: &Path) -> Result<PanelConfig, ConfigError> {
    let mut config: PanelConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

    config.paths.thermal_file = expand_path(&config.paths.thermal_file.to_string_lossy());
    config.paths.audio_dir = expand_path(&config.paths.audio_dir.to_string_lossy());

    Ok(config)
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut PanelConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides using an arbitrary variable lookup.
pub fn apply_overrides_from<F>(config: &mut PanelConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("PINPANEL_BIND_ADDRESS") {
        config.bind.address = v;
        sources.env_overrides.push("PINPANEL_BIND_ADDRESS".to_string());
    }
    if let Some(v) = lookup("PINPANEL_HTTP_PORT") {
        match v.parse() {
            Ok(port) => {
                config.bind.http_port = port;
                sources.env_overrides.push("PINPANEL_HTTP_PORT".to_string());
            }
            Err(_) => sources.env_rejected.push(format!("PINPANEL_HTTP_PORT={}", v)),
        }
    }

    if let Some(v) = lookup("PINPANEL_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
        sources.env_overrides.push("PINPANEL_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
        sources.env_overrides.push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("PINPANEL_LOG_LEVEL") {
        config.telemetry.log_level = Some(v);
        sources.env_overrides.push("PINPANEL_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = Some(v);
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    if let Some(v) = lookup("PINPANEL_GPIO_BACKEND") {
        match v.parse() {
            Ok(backend) => {
                config.gpio.backend = backend;
                sources.env_overrides.push("PINPANEL_GPIO_BACKEND".to_string());
            }
            Err(_) => sources
                .env_rejected
                .push(format!("PINPANEL_GPIO_BACKEND={}", v)),
        }
    }

    if let Some(v) = lookup("PINPANEL_THERMAL_FILE") {
        config.paths.thermal_file = expand_path(&v);
        sources.env_overrides.push("PINPANEL_THERMAL_FILE".to_string());
    }
    if let Some(v) = lookup("PINPANEL_AUDIO_DIR") {
        config.paths.audio_dir = expand_path(&v);
        sources.env_overrides.push("PINPANEL_AUDIO_DIR".to_string());
    }

    if let Some(v) = lookup("PINPANEL_PASSWORD") {
        config.auth.password = Some(v);
        sources.env_overrides.push("PINPANEL_PASSWORD".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GpioBackend, PinSpec};
    use std::collections::HashMap;

    fn parse(toml: &str) -> PanelConfig {
        from_table(toml.parse().unwrap(), Path::new("test.toml")).unwrap()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = parse(
            r#"
[bind]
http_port = 9000
"#,
        );
        assert_eq!(config.bind.http_port, 9000);
        assert_eq!(config.bind.address, "0.0.0.0");
        assert_eq!(config.pins, PinSpec::defaults());
    }

    #[test]
    fn test_parse_full_toml() {
        let config = parse(
            r#"
[bind]
address = "127.0.0.1"
http_port = 8090

[telemetry]
otlp_endpoint = "127.0.0.1:4317"
log_level = "debug"

[paths]
thermal_file = "/tmp/temp"
audio_dir = "/opt/audio"

[gpio]
backend = "chardev"
chip = "gpiochip1"

[audio]
enabled = false

[commands]
shutdown = ["systemctl", "poweroff"]

[auth]
password = "secret"

[panel]
await_writes = true
vnc_port = 5901

[[pins]]
id = 7
name = "Porch"

[[pins]]
id = 11
"#,
        );

        assert_eq!(config.bind.socket_addr(), "127.0.0.1:8090");
        assert_eq!(config.telemetry.otlp_endpoint.as_deref(), Some("127.0.0.1:4317"));
        assert_eq!(config.paths.audio_dir, PathBuf::from("/opt/audio"));
        assert_eq!(config.gpio.backend, GpioBackend::Chardev);
        assert_eq!(config.gpio.chip, "gpiochip1");
        assert_eq!(config.gpio.consumer, "pinpanel");
        assert!(!config.audio.enabled);
        assert_eq!(config.commands.shutdown, vec!["systemctl", "poweroff"]);
        assert_eq!(config.commands.restart, vec!["sudo", "reboot"]);
        assert!(config.auth.enabled());
        assert!(config.panel.await_writes);
        assert_eq!(config.panel.vnc_port, 5901);
        assert_eq!(config.pins, vec![PinSpec::named(7, "Porch"), PinSpec::new(11)]);
    }

    #[test]
    fn test_parse_rejects_bad_backend() {
        let table = r#"
[gpio]
backend = "wiringpi"
"#
        .parse()
        .unwrap();
        let err = from_table(table, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_merge_tables_overlay_wins() {
        let mut base: toml::Table = r#"
[bind]
address = "0.0.0.0"
http_port = 8081

[[pins]]
id = 1
"#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
[bind]
http_port = 9999

[[pins]]
id = 7

[[pins]]
id = 11
"#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);
        let config = from_table(base, Path::new("merged.toml")).unwrap();

        assert_eq!(config.bind.address, "0.0.0.0");
        assert_eq!(config.bind.http_port, 9999);
        let ids: Vec<u32> = config.pins.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![7, 11]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinpanel.toml");
        std::fs::write(&path, "[panel]\ntitle = \"Garage\"\n").unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.panel.title, "Garage");

        let missing = load_from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PINPANEL_HTTP_PORT", "9100"),
            ("PINPANEL_GPIO_BACKEND", "chardev"),
            ("PINPANEL_PASSWORD", "pw"),
            ("PINPANEL_THERMAL_FILE", "/tmp/fake-temp"),
        ]
        .into_iter()
        .collect();

        let mut config = PanelConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            vars.get(k).map(|v| v.to_string())
        });

        assert_eq!(config.bind.http_port, 9100);
        assert_eq!(config.gpio.backend, GpioBackend::Chardev);
        assert_eq!(config.auth.password.as_deref(), Some("pw"));
        assert_eq!(config.paths.thermal_file, PathBuf::from("/tmp/fake-temp"));
        assert_eq!(sources.env_overrides.len(), 4);
    }

    #[test]
    fn test_env_override_ignores_unparseable_port() {
        let mut config = PanelConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            (k == "PINPANEL_HTTP_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.bind.http_port, 8081);
        assert!(sources.env_overrides.is_empty());
        assert_eq!(sources.env_rejected, vec!["PINPANEL_HTTP_PORT=not-a-port"]);
    }

    #[test]
    fn test_env_override_records_bad_backend() {
        let mut config = PanelConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            (k == "PINPANEL_GPIO_BACKEND").then(|| "sysfs".to_string())
        });
        assert_eq!(config.gpio.backend, GpioBackend::Simulated);
        assert!(sources.env_overrides.is_empty());
        assert_eq!(sources.env_rejected, vec!["PINPANEL_GPIO_BACKEND=sysfs"]);
    }
}
