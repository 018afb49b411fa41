//! Shirizu tracking events and notification delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub for [`TrackingEvent`]s,
//!   backed by `tokio::sync::broadcast`. The tracking store publishes one
//!   event per mutation so observers can re-read their values.
//! - [`Notifier`]: the capability the worker uses to surface progress and
//!   new-chapter notifications.
//! - [`LogNotifier`] and [`WebhookNotifier`]: the provided notifiers.

pub mod bus;
pub mod delivery;
pub mod notifier;

pub use bus::{EventBus, TrackingEvent, TrackingEventKind};
pub use delivery::webhook::{WebhookError, WebhookNotifier};
pub use notifier::{LogNotifier, Notifier, NotifyError, UpdateNotification, Visibility};
