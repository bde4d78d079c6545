pub use crate::config::DropNotifierConfig;
pub use crate::error::{WatchdogError, WatchdogResult};
pub use crate::notifier::{DropNotification, DropNotifier};
