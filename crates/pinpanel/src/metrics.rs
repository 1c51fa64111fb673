//! OpenTelemetry counters for the dispatch path.
//!
//! Without an installed meter provider these are no-ops, so tests and plain
//! stdout runs pay nothing for them.

use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};

use crate::registry::PinId;

#[derive(Clone)]
pub struct PanelMetrics {
    dispatch_accepted: Counter<u64>,
    dispatch_rejected: Counter<u64>,
    hardware_errors: Counter<u64>,
    notifier_errors: Counter<u64>,
}

impl PanelMetrics {
    pub fn new() -> Self {
        let meter = global::meter("pinpanel");
        Self {
            dispatch_accepted: meter
                .u64_counter("pinpanel.dispatch.accepted")
                .with_description("Pin actions launched")
                .build(),
            dispatch_rejected: meter
                .u64_counter("pinpanel.dispatch.rejected")
                .with_description("Pin actions naming an unregistered pin")
                .build(),
            hardware_errors: meter
                .u64_counter("pinpanel.hardware.errors")
                .with_description("Failed GPIO reads and writes")
                .build(),
            notifier_errors: meter
                .u64_counter("pinpanel.notifier.errors")
                .with_description("Failed audio confirmations")
                .build(),
        }
    }

    pub fn accepted(&self, pin: PinId) {
        self.dispatch_accepted.add(1, &[pin_attr(pin)]);
    }

    pub fn rejected(&self, pin: PinId) {
        self.dispatch_rejected.add(1, &[pin_attr(pin)]);
    }

    pub fn hardware_error(&self, pin: PinId, op: &'static str) {
        self.hardware_errors
            .add(1, &[pin_attr(pin), KeyValue::new("op", op)]);
    }

    pub fn notifier_error(&self, pin: PinId) {
        self.notifier_errors.add(1, &[pin_attr(pin)]);
    }
}

impl Default for PanelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn pin_attr(pin: PinId) -> KeyValue {
    KeyValue::new("pin", i64::from(pin.0))
}
