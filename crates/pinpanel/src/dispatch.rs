//! Action dispatch: validate a pin action and launch its side effects.
//!
//! A dispatch fans out into two detached tokio tasks, the hardware write and
//! the audio confirmation, and returns as soon as both are spawned. Neither
//! task is cancelled or awaited by the dispatcher; dropping the returned
//! [`DispatchTicket`] detaches them.
//!
//! Both sides are validated against the registry: an unregistered pin gets no
//! write and no confirmation clip.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::hardware::{GpioAdapter, HardwareError};
use crate::metrics::PanelMetrics;
use crate::notifier::AudioNotifier;
use crate::registry::{PinId, PinRegistry};

/// What the user asked a pin to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Energize,
    DeEnergize,
}

impl Intent {
    /// Output level this intent drives the line to.
    pub fn level(self) -> bool {
        matches!(self, Intent::Energize)
    }

    /// URL and clip-name token: `on` or `off`.
    pub fn token(self) -> &'static str {
        match self {
            Intent::Energize => "on",
            Intent::DeEnergize => "off",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Intent::Energize),
            "off" => Ok(Intent::DeEnergize),
            other => Err(format!("unknown pin status: {}", other)),
        }
    }
}

/// Handles to the two launched side effects.
#[derive(Debug)]
pub struct DispatchTicket {
    pin: PinId,
    write: JoinHandle<Result<(), HardwareError>>,
    notify: JoinHandle<()>,
}

impl DispatchTicket {
    pub fn pin(&self) -> PinId {
        self.pin
    }

    /// Wait for the hardware write only. The confirmation clip keeps playing
    /// on its own.
    pub async fn settle(self) -> Result<(), HardwareError> {
        let DispatchTicket { pin, write, notify } = self;
        drop(notify);
        match write.await {
            Ok(result) => result,
            Err(join_err) => Err(HardwareError::Io {
                pin,
                message: format!("write task failed: {}", join_err),
            }),
        }
    }

    /// Wait for both side effects. Used by tests that need the notifier to
    /// have run as well.
    pub async fn settle_all(self) -> Result<(), HardwareError> {
        let DispatchTicket { pin, write, notify } = self;
        let _ = notify.await;
        match write.await {
            Ok(result) => result,
            Err(join_err) => Err(HardwareError::Io {
                pin,
                message: format!("write task failed: {}", join_err),
            }),
        }
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Both side effects were launched.
    Accepted(DispatchTicket),
    /// The pin is not registered; nothing was launched.
    UnknownPin(PinId),
}

impl DispatchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DispatchOutcome::Accepted(_))
    }
}

pub struct Dispatcher {
    registry: Arc<PinRegistry>,
    gpio: Arc<dyn GpioAdapter>,
    notifier: Arc<dyn AudioNotifier>,
    metrics: PanelMetrics,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<PinRegistry>,
        gpio: Arc<dyn GpioAdapter>,
        notifier: Arc<dyn AudioNotifier>,
    ) -> Self {
        Self {
            registry,
            gpio,
            notifier,
            metrics: PanelMetrics::new(),
        }
    }

    /// Launch the write and the confirmation for `pin`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, pin: PinId, intent: Intent) -> DispatchOutcome {
        if !self.registry.contains(pin) {
            debug!(pin = %pin, intent = %intent, "Ignoring action for unregistered pin");
            self.metrics.rejected(pin);
            return DispatchOutcome::UnknownPin(pin);
        }

        info!(pin = %pin, intent = %intent, "Dispatching pin action");
        self.metrics.accepted(pin);

        let write = self.spawn_write(pin, intent);
        let notify = self.spawn_notify(pin, intent);

        DispatchOutcome::Accepted(DispatchTicket { pin, write, notify })
    }

    fn spawn_write(&self, pin: PinId, intent: Intent) -> JoinHandle<Result<(), HardwareError>> {
        let gpio = Arc::clone(&self.gpio);
        let registry = Arc::clone(&self.registry);
        let metrics = self.metrics.clone();
        let level = intent.level();

        tokio::spawn(
            async move {
                match gpio.write(pin, level).await {
                    Ok(()) => {
                        registry.set_level(pin, level);
                        debug!("Pin write complete");
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "Pin write failed");
                        metrics.hardware_error(pin, "write");
                        Err(e)
                    }
                }
            }
            .instrument(tracing::info_span!("pin.write", pin = %pin, level = level)),
        )
    }

    fn spawn_notify(&self, pin: PinId, intent: Intent) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let metrics = self.metrics.clone();

        tokio::spawn(
            async move {
                if let Err(e) = notifier.notify(pin, intent).await {
                    warn!(error = %e, "Audio confirmation failed");
                    metrics.notifier_error(pin);
                }
            }
            .instrument(tracing::info_span!("pin.notify", pin = %pin, intent = %intent)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedGpio;
    use crate::notifier::NotifierError;
    use async_trait::async_trait;
    use pinconf::PinSpec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(PinId, Intent)>>,
        fail: bool,
    }

    #[async_trait]
    impl AudioNotifier for RecordingNotifier {
        async fn notify(&self, pin: PinId, intent: Intent) -> Result<(), NotifierError> {
            self.calls.lock().unwrap().push((pin, intent));
            if self.fail {
                Err(NotifierError::MissingClip(format!("{}-{}.mp3", pin, intent).into()))
            } else {
                Ok(())
            }
        }
    }

    async fn setup(
        ids: &[u32],
        notifier: RecordingNotifier,
    ) -> (Dispatcher, Arc<PinRegistry>, Arc<SimulatedGpio>, Arc<RecordingNotifier>) {
        let specs: Vec<PinSpec> = ids.iter().copied().map(PinSpec::new).collect();
        let registry = Arc::new(PinRegistry::from_specs(&specs).unwrap());
        let gpio = Arc::new(SimulatedGpio::new());
        for id in registry.ids() {
            gpio.configure_output(id).await.unwrap();
        }
        let notifier = Arc::new(notifier);
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            gpio.clone(),
            notifier.clone(),
        );
        (dispatcher, registry, gpio, notifier)
    }

    fn ticket(outcome: DispatchOutcome) -> DispatchTicket {
        match outcome {
            DispatchOutcome::Accepted(ticket) => ticket,
            other => panic!("expected Accepted, got {:?}", other),
        }
    }

    #[test]
    fn test_intent_tokens() {
        assert_eq!("on".parse::<Intent>().unwrap(), Intent::Energize);
        assert_eq!("off".parse::<Intent>().unwrap(), Intent::DeEnergize);
        assert!("toggle".parse::<Intent>().is_err());
        assert!(Intent::Energize.level());
        assert!(!Intent::DeEnergize.level());
        assert_eq!(Intent::DeEnergize.to_string(), "off");
    }

    #[tokio::test]
    async fn test_known_pin_writes_and_notifies_once() {
        for intent in [Intent::Energize, Intent::DeEnergize] {
            let (dispatcher, _registry, gpio, notifier) =
                setup(&[7, 11], RecordingNotifier::default()).await;

            let t = ticket(dispatcher.dispatch(PinId(7), intent));
            t.settle_all().await.unwrap();

            assert_eq!(gpio.writes(), vec![(PinId(7), intent.level())]);
            assert_eq!(*notifier.calls.lock().unwrap(), vec![(PinId(7), intent)]);
        }
    }

    #[tokio::test]
    async fn test_unknown_pin_has_no_side_effects() {
        let (dispatcher, _registry, gpio, notifier) =
            setup(&[7, 11], RecordingNotifier::default()).await;

        let outcome = dispatcher.dispatch(PinId(99), Intent::Energize);
        assert!(matches!(outcome, DispatchOutcome::UnknownPin(PinId(99))));

        // Give any stray task a chance to run
        tokio::task::yield_now().await;
        assert!(gpio.writes().is_empty());
        assert!(notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_write_updates_registry() {
        let (dispatcher, registry, _gpio, _notifier) =
            setup(&[7], RecordingNotifier::default()).await;

        ticket(dispatcher.dispatch(PinId(7), Intent::Energize))
            .settle()
            .await
            .unwrap();
        assert!(registry.lookup(PinId(7)).unwrap().level);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_on_settle_only() {
        let (dispatcher, registry, gpio, notifier) =
            setup(&[3], RecordingNotifier::default()).await;
        gpio.fail_pin(PinId(3));

        let outcome = dispatcher.dispatch(PinId(3), Intent::Energize);
        assert!(outcome.is_accepted());

        let err = ticket(outcome).settle_all().await.unwrap_err();
        assert!(matches!(err, HardwareError::Io { pin: PinId(3), .. }));
        assert!(!registry.lookup(PinId(3)).unwrap().level);
        // The confirmation still played
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_affect_write() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let (dispatcher, registry, gpio, _notifier) = setup(&[5], notifier).await;

        ticket(dispatcher.dispatch(PinId(5), Intent::Energize))
            .settle_all()
            .await
            .unwrap();
        assert_eq!(gpio.level(PinId(5)), Some(true));
        assert!(registry.lookup(PinId(5)).unwrap().level);
    }

    #[tokio::test]
    async fn test_dropped_ticket_still_completes() {
        let (dispatcher, _registry, gpio, _notifier) =
            setup(&[9], RecordingNotifier::default()).await;

        drop(dispatcher.dispatch(PinId(9), Intent::Energize));

        for _ in 0..100 {
            if gpio.level(PinId(9)) == Some(true) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("detached write never reached the adapter");
    }

    /// Writes hang until released.
    #[derive(Default)]
    struct GatedGpio {
        release: tokio::sync::Notify,
        written: AtomicBool,
    }

    #[async_trait]
    impl GpioAdapter for GatedGpio {
        async fn configure_output(&self, _pin: PinId) -> Result<(), HardwareError> {
            Ok(())
        }

        async fn write(&self, _pin: PinId, _level: bool) -> Result<(), HardwareError> {
            self.release.notified().await;
            self.written.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn read(&self, _pin: PinId) -> Result<bool, HardwareError> {
            Ok(self.written.load(Ordering::SeqCst))
        }

        fn backend_name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_dispatch_returns_before_write_completes() {
        let registry = Arc::new(PinRegistry::from_specs(&[PinSpec::new(7)]).unwrap());
        let gpio = Arc::new(GatedGpio::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), gpio.clone(), notifier.clone());

        let t = ticket(dispatcher.dispatch(PinId(7), Intent::Energize));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!gpio.written.load(Ordering::SeqCst));
        assert!(!registry.lookup(PinId(7)).unwrap().level);
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);

        gpio.release.notify_one();
        t.settle().await.unwrap();
        assert!(registry.lookup(PinId(7)).unwrap().level);
    }
}
