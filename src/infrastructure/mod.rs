pub mod persistence;

pub use persistence::{FileStore, InMemoryStore, KeyValueStore};
