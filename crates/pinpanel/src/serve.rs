//! Panel server startup and lifecycle.
//!
//! Builds every component from [`PanelConfig`], then serves the router until
//! SIGINT or SIGTERM.

use anyhow::{Context, Result};
use pinconf::PanelConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::gate::{CommandGate, ProcessCommander};
use crate::hardware::{self, GpioAdapter};
use crate::notifier::{AudioNotifier, PlayerNotifier, SilentNotifier};
use crate::reconcile::Reconciler;
use crate::registry::PinRegistry;
use crate::session::{spawn_cleanup_task, SessionStore};
use crate::thermal;
use crate::web::{self, PanelState};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Claim every registered pin as an output. Failures are logged; the pin stays
/// registered and later reads and writes report their own errors.
pub async fn configure_pins(registry: &PinRegistry, gpio: &dyn GpioAdapter) -> usize {
    let mut configured = 0;
    for id in registry.ids() {
        match gpio.configure_output(id).await {
            Ok(()) => configured += 1,
            Err(e) => warn!(pin = %id, error = %e, "Failed to configure pin as output"),
        }
    }
    configured
}

/// Run the panel server
pub async fn run(config: PanelConfig) -> Result<()> {
    info!("Pinpanel starting");

    let registry =
        Arc::new(PinRegistry::from_specs(&config.pins).context("Invalid pin configuration")?);

    let temperature = thermal::read_temperature(&config.paths.thermal_file)
        .await
        .context("Failed to read board temperature")?;
    info!("   Temperature: {}", temperature);

    let gpio = hardware::open(&config.gpio)
        .await
        .context("Failed to open GPIO backend")?;
    let configured = configure_pins(&registry, gpio.as_ref()).await;
    info!(
        "   GPIO: {} backend, {}/{} pins configured",
        gpio.backend_name(),
        configured,
        registry.len()
    );

    let notifier: Arc<dyn AudioNotifier> = if config.audio.enabled {
        info!(
            "   Audio: {} from {}",
            config.audio.player,
            config.paths.audio_dir.display()
        );
        Arc::new(PlayerNotifier::new(
            config.audio.player.clone(),
            config.paths.audio_dir.clone(),
        ))
    } else {
        info!("   Audio: disabled");
        Arc::new(SilentNotifier)
    };

    let commander = Arc::new(ProcessCommander::new(
        config.commands.shutdown.clone(),
        config.commands.restart.clone(),
    ));

    let sessions = SessionStore::new_shared();
    let cancel_token = CancellationToken::new();
    let cleanup_handle = spawn_cleanup_task(
        Arc::clone(&sessions),
        SESSION_SWEEP_INTERVAL,
        Duration::from_secs(config.auth.session_idle_secs),
        cancel_token.clone(),
    );

    if config.auth.enabled() {
        info!("   Auth: login required for {}", config.auth.username);
    } else {
        warn!("   Auth: disabled, the panel is open to anyone on the network");
    }

    let state = PanelState {
        registry: Arc::clone(&registry),
        dispatcher: Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&gpio),
            notifier,
        )),
        reconciler: Arc::new(Reconciler::new(Arc::clone(&registry), Arc::clone(&gpio))),
        gate: Arc::new(CommandGate::new(commander)),
        sessions,
        auth: Arc::new(config.auth.clone()),
        settings: Arc::new(config.panel.clone()),
        temperature: Arc::from(temperature),
        backend: gpio.backend_name(),
        start_time: Instant::now(),
    };

    let app = web::router(state);

    let addr = config.bind.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Pinpanel ready!");
    info!("   Panel: http://{}/", addr);
    info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel_token.cancel();
    let _ = cleanup_handle.await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedGpio;
    use crate::registry::PinId;
    use pinconf::PinSpec;

    #[tokio::test]
    async fn test_configure_pins_skips_failures() {
        let registry = PinRegistry::from_specs(&[PinSpec::new(1), PinSpec::new(2)]).unwrap();
        let gpio = SimulatedGpio::new();
        gpio.fail_pin(PinId(2));

        assert_eq!(configure_pins(&registry, &gpio).await, 1);
        assert!(gpio.read(PinId(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_fails_without_thermal_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::default();
        config.paths.thermal_file = dir.path().join("missing");

        let err = run(config).await.unwrap_err();
        assert!(format!("{:#}", err).contains("temperature"));
    }

    #[tokio::test]
    async fn test_run_fails_on_duplicate_pins() {
        let mut config = PanelConfig::default();
        config.pins = vec![PinSpec::new(4), PinSpec::new(4)];

        let err = run(config).await.unwrap_err();
        assert!(format!("{:#}", err).contains("pin configuration"));
    }
}
