//! Domain models for Scholaris.
//!
//! These are the core types shared across all crates.

pub mod academic_session;
pub mod class;
pub mod principal;
pub mod promotion;
pub mod student;
pub mod tenant;
