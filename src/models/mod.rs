//! Data models for the Murmur client core
//!
//! These types cross the boundaries to the backend API and the local
//! database.

mod types;

pub use types::*;
