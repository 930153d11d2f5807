//! Memory database module - SQLite-backed storage for conversational turns
pub mod schema;
pub mod migration;
pub mod identity;
pub mod entry_store;
pub use schema::*;
pub use migration::MigrationManager;
pub use identity::generate_id;
pub use entry_store::SqliteMemoryStore;
