pub mod scheduler;
pub mod signal_generator;
pub mod strike_tracker;

pub use scheduler::MinuteTicker;
pub use signal_generator::{CycleReport, SignalGenerator};
pub use strike_tracker::{ChainSource, StrikeTracker, SubscriptionTarget};
