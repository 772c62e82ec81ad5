pub mod cache;
pub mod db;

pub use cache::MemoryCacheAdapter;
pub use db::DbAdapter;
