//! pinpanel - browser control panel for GPIO output pins
//!
//! This library provides:
//! - `registry`: the fixed pin set and cached levels
//! - `hardware`: GPIO adapter trait plus simulated and chardev backends
//! - `notifier`: audio confirmation clips
//! - `dispatch`: pin actions fanned out to hardware and audio
//! - `reconcile`: refresh cached levels from hardware
//! - `gate`: once-per-session shutdown and restart
//! - `session`: cookie sessions and login state
//! - `web`: axum router and handlers
//! - `serve`: startup and lifecycle

pub mod dispatch;
pub mod gate;
pub mod hardware;
pub mod metrics;
pub mod notifier;
pub mod panel;
pub mod reconcile;
pub mod registry;
pub mod serve;
pub mod session;
pub mod telemetry;
pub mod thermal;
pub mod web;

pub use dispatch::{DispatchOutcome, DispatchTicket, Dispatcher, Intent};
pub use gate::{CommandGate, CommandKind, GateFlags, ProcessCommander, SystemCommander};
pub use hardware::{GpioAdapter, HardwareError, SimulatedGpio};
pub use notifier::{AudioNotifier, PlayerNotifier, SilentNotifier};
pub use reconcile::{Reconciler, Snapshot};
pub use registry::{Pin, PinId, PinRegistry};
pub use session::SessionStore;
pub use web::{router, PanelState};
