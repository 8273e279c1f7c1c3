//! Application services: the home payload source and its read-through cache.

pub mod error;
pub mod home;
pub mod source;
