//! Application services: content reads on top of the cache and the origin.

pub mod content;
pub mod error;
pub mod origin;
