//! Database layer
//!
//! MongoDB connection, typed collections and schemas, plus the store traits
//! the services depend on and an in-memory implementation of them.

pub mod memory;
pub mod mongo;
pub mod mongo_store;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use mongo_store::MongoStore;
pub use store::{FieldStore, HistoryStore, IdentityStore};
