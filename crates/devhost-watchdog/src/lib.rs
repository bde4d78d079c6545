//! Rate-limited drop notification for devhost's shared-memory data
//! plane: the first dropped frame for a session is reported immediately,
//! subsequent drops are batched per [`config::DropNotifierConfig`].

pub mod config;
pub mod error;
pub mod notifier;
pub mod prelude;

pub use config::DropNotifierConfig;
pub use error::{WatchdogError, WatchdogResult};
pub use notifier::{DropNotification, DropNotifier};
