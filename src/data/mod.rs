pub mod repository;
pub mod sqlite;
pub mod store;
pub mod tick;
pub mod window;

pub use repository::{InMemorySignalRepository, RecentSignals, Recorded, SignalRepository};
pub use sqlite::SqliteSignalRepository;
pub use store::{MarketStore, StreamEntry, TickStore};
pub use tick::Tick;
pub use window::{to_arrays, ArrayBundle, WindowAggregator};

#[cfg(test)]
mod store_tests;
