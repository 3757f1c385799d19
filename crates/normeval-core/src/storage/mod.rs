pub mod schema;
pub mod store;

pub use store::{ModelStats, NormStats, Store, StoreStats};
