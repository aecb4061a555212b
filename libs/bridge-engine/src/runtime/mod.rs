//! Host collaborators for running the bridge in a standalone process.

mod bus;
mod clock;
mod timer;

pub use bus::{LocalBus, is_valid_msg_type};
pub use clock::SystemClock;
pub use timer::TokioTimers;
