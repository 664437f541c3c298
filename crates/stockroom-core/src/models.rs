//! Domain models for Stockroom.
//!
//! These are the core types shared across all crates.

pub mod backup;
pub mod group;
pub mod item;
pub mod resource;
pub mod role;
pub mod share;
pub mod user;
