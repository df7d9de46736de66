//! Outbound alerts.
//!
//! - `telegram`: Bot API delivery
//! - `messages`: Markdown bodies for signals, time limits and reports

mod messages;
mod telegram;

pub use messages::{
    format_price, observer_report, online_message, signal_message, time_limit_message,
};
pub use telegram::TelegramNotifier;

use async_trait::async_trait;

/// Delivery sink for alert text. Delivery failures are logged by the
/// implementation and never surface to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}
