// Storage module: run history in SQLite.

pub mod sqlite;

pub use sqlite::RunStore;
