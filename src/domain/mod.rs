//! Domain types for the authoritative task representation.
//!
//! [`TaskRecord`] is what the store owns. Everything handed to callers is a
//! view built from a snapshot of it.

pub mod record;

pub use record::*;
