//! Background refresh scheduling.

mod clock;
mod refresh;

pub use clock::{Clock, TokioClock};
pub use refresh::RefreshScheduler;
