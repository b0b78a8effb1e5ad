

pub mod client;
pub mod memory;
pub mod schema;
pub mod store;

pub use client::{RetryPolicy, StoreClient};
pub use memory::InMemoryStore;
pub use store::{DataStore, Predicate, Row, StoreError, StoreOp};
