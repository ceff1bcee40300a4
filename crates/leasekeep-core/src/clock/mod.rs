//! Time source for expiry decisions and scheduler ticks

mod traits;
mod system;
mod manual;

pub use traits::{Clock, SharedClock};
pub use system::SystemClock;
pub use manual::ManualClock;
