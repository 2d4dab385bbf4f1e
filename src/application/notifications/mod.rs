//! Notification services.

mod fan_out;

pub use fan_out::{FanOutConfig, NotificationFanOut};
