//! Upstream venue plumbing: wire codec, subscriptions, the streaming client
//! and option-chain discovery.

pub mod instruments;
pub mod proto;
pub mod subscription;
pub mod ws;

pub use instruments::{atm_strike, strike_ladder, weekly_expiry, InstrumentSet, OptionChainClient};
pub use subscription::{ControlFrame, ControlSink, SubscriptionManager};
pub use ws::{FeedClient, FeedHandle, FeedState};
