mod memory;
mod none;
mod sqlite;

pub use self::memory::MemoryCache;
pub use self::none::NoCache;
pub use self::sqlite::SqliteCache;
