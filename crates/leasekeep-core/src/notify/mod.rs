//! User-visible notifications on mass revocation

mod traits;
mod noop;
mod log_notifier;
mod recording;

pub use traits::{Notifier, NotifyError, NotifyResult, SharedNotifier, notify_logged};
pub use noop::NoOpNotifier;
pub use log_notifier::LogNotifier;
pub use recording::{RecordingNotifier, Notification};
