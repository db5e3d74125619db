//! Notification composition and delivery.
//!
//! This crate provides:
//! - `NotificationComposer`, turning an admitted event into a `Notification`
//! - the per-kind minijinja template table
//! - `DeliveryTransport` and its reqwest implementation `HttpTransport`
//! - `Dispatcher`, fanning a notification out to every destination

pub mod composer;
pub mod dispatcher;
pub mod http;
pub mod notification;
pub mod payload;
pub mod templating;
pub mod traits;

pub use composer::NotificationComposer;
pub use dispatcher::{DeliveryOutcome, DeliveryReport, Dispatcher};
pub use http::HttpTransport;
pub use notification::{Attribution, Destination, Notification, NotificationField};
pub use payload::MessagePayload;
pub use traits::{DeliveryError, DeliveryTransport};
