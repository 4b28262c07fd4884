pub mod store;
pub mod time;

pub use store::KeyValueStore;
pub use time::TimeProvider;
