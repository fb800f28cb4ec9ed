pub mod pool;

pub use pool::DbPool;
