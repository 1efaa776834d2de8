pub mod lmdb_storage;

pub use lmdb_storage::LmdbStore;
