mod channel;
mod dispatch;
mod history;
mod nats;
mod retry;
mod webhook;

pub use channel::{Notifier, NotifyError};
pub use dispatch::NotifyLoop;
pub use history::HistoryNotifier;
pub use nats::NatsNotifier;
pub use retry::RetryNotifier;
pub use webhook::WebhookNotifier;
