//! Local SQLite persistence

mod pool;

pub use pool::*;
